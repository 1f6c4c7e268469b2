//! Test fixtures for integration tests
//!
//! CSV documents for the bulk user import.

#![allow(dead_code)]

/// English headers, two complete rows
pub const USERS_CSV: &str = "name,email,phone,age,location\n\
Ana Pérez,ana.import@example.com,809-555-0110,29,Santo Domingo\n\
Luis Gómez,luis.import@example.com,809-555-0111,41,Santiago\n";

/// Spanish headers with a byte order mark, as exported by spreadsheet tools
pub const SPANISH_USERS_CSV: &str = "\u{feff}nombre,correo,telefono,edad,ciudad\n\
María Rodríguez,maria.import@example.com,809-555-0120,35,La Romana\n";

/// One valid row, one duplicate inside the file, one bad email and one bad age
pub const MIXED_USERS_CSV: &str = "name,email,age\n\
Carmen Díaz,carmen.import@example.com,30\n\
Carmen Repetida,carmen.import@example.com,31\n\
Sin Correo,not-an-email,25\n\
Edad Rara,edad.import@example.com,abc\n";

/// Missing the mandatory email column
pub const MISSING_COLUMNS_CSV: &str = "name,phone\nPedro,809-555-0130\n";

// Application layer shared by the binaries: query loop and error reporting.

pub mod session;

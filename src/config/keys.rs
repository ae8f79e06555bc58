//! Configuration key names

/// Database user
pub const USER: &str = "POSTGRES_USER";

/// Database password
pub const PASSWORD: &str = "POSTGRES_PASSWORD";

/// Server host name, IP address, or Unix socket directory
pub const HOST: &str = "POSTGRES_HOST";

/// Server port
pub const PORT: &str = "POSTGRES_PORT";

/// Database name
pub const DATABASE: &str = "POSTGRES_DB";

/// All required keys, in resolution order
pub const REQUIRED: [&str; 5] = [USER, PASSWORD, HOST, PORT, DATABASE];

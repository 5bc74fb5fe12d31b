pub mod drivers;
pub mod init;
pub mod literal;
pub mod transfer;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Write a config with the sandbox and raw output locations
    Init(init::InitArgs),
    /// Upload a local file or directory
    Put(transfer::PutArgs),
    /// Download a remote object or directory
    Get(transfer::GetArgs),
    /// Check whether a path exists in its store
    Exists(transfer::ExistsArgs),
    /// List registered persistence schemes
    Drivers(drivers::DriversArgs),
    /// Upload a local artifact and print its blob literal
    Pack(literal::PackArgs),
    /// Materialize a blob literal into the sandbox
    Unpack(literal::UnpackArgs),
}

mod capture;
mod command;
mod config;
mod invoker;
mod prerequisites;
mod process;

pub use config::DockerConfig;
pub use invoker::DockerInvoker;

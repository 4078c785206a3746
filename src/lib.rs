pub mod core;
pub mod conversation;
pub mod config;
pub mod tools;

// Model providers
pub mod llm;

// Agent/tool workflow and history trimming
pub mod agent;

// Wire format shared by server and client
pub mod protocol;

// Stream sessions and their collaborators
pub mod session;

// Transport
pub mod server;
pub mod client;

// Optional components
pub mod cli;
pub mod logging;

#[cfg(test)]
mod test_support;

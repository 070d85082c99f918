pub mod artifact;

pub mod client {
    pub mod coordinator;
    pub mod presenter;
    pub mod projector;
    pub mod session;
}

pub mod config;

pub mod protocol {
    pub mod codec;
    pub mod encoding;
    pub mod message;
}

pub mod utils;

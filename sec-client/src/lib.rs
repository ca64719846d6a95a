pub mod api;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod cron;
pub mod event;
pub mod home_doc;
pub mod prometheus;
pub mod serializer;
pub mod shutdown;
pub mod sinks;
pub mod submitter;
pub mod throttle;
pub mod time;
pub mod transport;

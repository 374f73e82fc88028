mod common;
mod config;
mod execution;
mod lifecycle;
mod loading;
mod previews;

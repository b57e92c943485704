mod common;
mod mapping;
mod scoring;

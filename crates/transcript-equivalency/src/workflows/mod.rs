pub mod equivalency;

pub mod academics;
pub mod action;
pub mod actor;
pub mod application;
pub mod flow;

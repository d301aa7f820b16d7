#![allow(dead_code)]

pub mod site;
pub mod utils;

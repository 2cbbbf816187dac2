#![allow(dead_code)]

pub mod scene;

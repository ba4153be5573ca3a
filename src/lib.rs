#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

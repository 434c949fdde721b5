//! fieldcheck CLI
//!
//! Command-line front end for running the CRM integration suite and
//! inspecting its reports.

pub mod commands;
pub mod output;

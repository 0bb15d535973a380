#![doc = include_str!("../readme.md")]

pub mod cloud;
pub mod config;
pub mod cost_model;
pub mod error;
pub mod events;
pub mod job_scheduler;
pub mod output;
pub mod power_meter;
pub mod resolver;
pub mod scheduling_algorithm;
pub mod scheduling_algorithms;
pub mod simulation;
pub mod wms;
pub mod workflow;

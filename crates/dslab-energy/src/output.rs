//! Measurements collected during the simulation.

use serde::Serialize;

/// Power sample of a host under one accounting model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyMeasurement {
    pub host: String,
    /// Power accounting model tag.
    pub model: String,
    /// Power in W.
    pub power: f64,
    /// Simulation time of the sample.
    pub time: f64,
    /// Measurement period in seconds the sample stands for.
    pub period: f64,
}

impl EnergyMeasurement {
    /// Energy consumed over the measurement period in Wh.
    pub fn energy_wh(&self) -> f64 {
        self.power * self.period / 3600.
    }
}

/// Append-only store of energy measurements.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationOutput {
    measurements: Vec<EnergyMeasurement>,
}

impl SimulationOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_measurement(&mut self, measurement: EnergyMeasurement) {
        self.measurements.push(measurement);
    }

    pub fn measurements(&self) -> &[EnergyMeasurement] {
        &self.measurements
    }

    pub fn measurements_for_host<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a EnergyMeasurement> {
        self.measurements.iter().filter(move |m| m.host == host)
    }

    pub fn measurements_for_model<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a EnergyMeasurement> {
        self.measurements.iter().filter(move |m| m.model == model)
    }

    /// Total energy in Wh recorded under the model.
    pub fn total_energy(&self, model: &str) -> f64 {
        self.measurements_for_model(model).map(|m| m.energy_wh()).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

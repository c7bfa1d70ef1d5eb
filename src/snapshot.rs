// snapshot.rs
use serde::{Deserialize, Serialize};

/// Coercion rule applied to a wire value before it is written to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Number,
    Flag,
    Text,
}

/// Every field the dashboard displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    StatusOnValue,
    AntiSwayValue,
    BrakingOnValue,
    TotalOnTime,
    HoistTime,
    TrolleyTime,
    LongTravelTime,
    HoistOverload,
    TrolleyOverload,
    LongTravelOverload,
    HoistPulse,
    TrolleyPulse,
    LongTravelPulse,
    RunningTimeTotal,
    MaintenanceDueDate,
    PushPulseCount,
    BacktrackingCount,
    ReversalCount,
    AlarmCount,
    BrakingLifetimeRemain,
    BrakingTimeTotal,
    BrakingReplacementCount,
    Current,
    Overcurrent,
    Overvoltage,
    InverterOverloadError,
}

impl Metric {
    pub const ALL: [Metric; 26] = [
        Metric::StatusOnValue,
        Metric::AntiSwayValue,
        Metric::BrakingOnValue,
        Metric::TotalOnTime,
        Metric::HoistTime,
        Metric::TrolleyTime,
        Metric::LongTravelTime,
        Metric::HoistOverload,
        Metric::TrolleyOverload,
        Metric::LongTravelOverload,
        Metric::HoistPulse,
        Metric::TrolleyPulse,
        Metric::LongTravelPulse,
        Metric::RunningTimeTotal,
        Metric::MaintenanceDueDate,
        Metric::PushPulseCount,
        Metric::BacktrackingCount,
        Metric::ReversalCount,
        Metric::AlarmCount,
        Metric::BrakingLifetimeRemain,
        Metric::BrakingTimeTotal,
        Metric::BrakingReplacementCount,
        Metric::Current,
        Metric::Overcurrent,
        Metric::Overvoltage,
        Metric::InverterOverloadError,
    ];

    /// Display name, which is also the wire key unless [`BINDINGS`] says otherwise.
    pub fn name(self) -> &'static str {
        match self {
            Metric::StatusOnValue => "statusOnValue",
            Metric::AntiSwayValue => "antiSwayValue",
            Metric::BrakingOnValue => "brakingOnValue",
            Metric::TotalOnTime => "totalOnTime",
            Metric::HoistTime => "hoistTime",
            Metric::TrolleyTime => "trolleyTime",
            Metric::LongTravelTime => "longTravelTime",
            Metric::HoistOverload => "hoistOverload",
            Metric::TrolleyOverload => "trolleyOverload",
            Metric::LongTravelOverload => "longTravelOverload",
            Metric::HoistPulse => "hoistPulse",
            Metric::TrolleyPulse => "trolleyPulse",
            Metric::LongTravelPulse => "longTravelPulse",
            Metric::RunningTimeTotal => "runningTimeTotal",
            Metric::MaintenanceDueDate => "maintenanceDueDate",
            Metric::PushPulseCount => "pushPulseCount",
            Metric::BacktrackingCount => "backtrackingCount",
            Metric::ReversalCount => "reversalCount",
            Metric::AlarmCount => "alarmCount",
            Metric::BrakingLifetimeRemain => "brakingLifetimeRemain",
            Metric::BrakingTimeTotal => "brakingTimeTotal",
            Metric::BrakingReplacementCount => "brakingReplacementCount",
            Metric::Current => "current",
            Metric::Overcurrent => "overcurrent",
            Metric::Overvoltage => "overvoltage",
            Metric::InverterOverloadError => "inverterOverloadError",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            Metric::AntiSwayValue | Metric::MaintenanceDueDate => MetricKind::Text,
            Metric::Overcurrent | Metric::Overvoltage | Metric::InverterOverloadError => {
                MetricKind::Flag
            }
            _ => MetricKind::Number,
        }
    }
}

/// One row of the wire-key lookup table.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub wire_key: &'static str,
    pub metric: Metric,
}

const fn bind(wire_key: &'static str, metric: Metric) -> Binding {
    Binding { wire_key, metric }
}

/// Wire key → field. A wire key may feed several fields.
pub const BINDINGS: &[Binding] = &[
    bind("statusOnValue", Metric::StatusOnValue),
    bind("antiSwayValue", Metric::AntiSwayValue),
    // braking-on readout is driven by the backtracking counter
    bind("backtrackingCount", Metric::BrakingOnValue),
    bind("totalOnTime", Metric::TotalOnTime),
    bind("hoistTime", Metric::HoistTime),
    bind("trolleyTime", Metric::TrolleyTime),
    bind("longTravelTime", Metric::LongTravelTime),
    bind("hoistOverload", Metric::HoistOverload),
    bind("trolleyOverload", Metric::TrolleyOverload),
    bind("longTravelOverload", Metric::LongTravelOverload),
    bind("hoistPulse", Metric::HoistPulse),
    bind("trolleyPulse", Metric::TrolleyPulse),
    bind("longTravelPulse", Metric::LongTravelPulse),
    bind("runningTimeTotal", Metric::RunningTimeTotal),
    bind("maintenanceDueDate", Metric::MaintenanceDueDate),
    bind("pushPulseCount", Metric::PushPulseCount),
    bind("backtrackingCount", Metric::BacktrackingCount),
    bind("reversalCount", Metric::ReversalCount),
    bind("alarmCount", Metric::AlarmCount),
    bind("brakingLifetimeRemain", Metric::BrakingLifetimeRemain),
    bind("brakingTimeTotal", Metric::BrakingTimeTotal),
    bind("brakingReplacementCount", Metric::BrakingReplacementCount),
    bind("current", Metric::Current),
    bind("overcurrent", Metric::Overcurrent),
    bind("overvoltage", Metric::Overvoltage),
    bind("inverterOverloadError", Metric::InverterOverloadError),
];

pub fn bindings_for(wire_key: &str) -> impl Iterator<Item = Metric> + '_ {
    BINDINGS
        .iter()
        .filter(move |b| b.wire_key == wire_key)
        .map(|b| b.metric)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounters {
    pub running_time_total: f64,
    pub maintenance_due_date: String,
    pub push_pulse_count: f64,
    pub backtracking_count: f64,
    pub reversal_count: f64,
    pub alarm_count: f64,
    pub braking_lifetime_remain: f64,
    pub braking_time_total: f64,
    pub braking_replacement_count: f64,
    pub current: f64,
    pub overcurrent: bool,
    pub overvoltage: bool,
    pub inverter_overload_error: bool,
}

impl Default for DashboardCounters {
    fn default() -> Self {
        Self {
            running_time_total: 0.0,
            maintenance_due_date: String::new(),
            push_pulse_count: 0.0,
            backtracking_count: 0.0,
            reversal_count: 0.0,
            alarm_count: 0.0,
            braking_lifetime_remain: 0.0,
            braking_time_total: 0.0,
            braking_replacement_count: 0.0,
            current: 0.0,
            overcurrent: false,
            overvoltage: false,
            inverter_overload_error: false,
        }
    }
}

/// Everything the dashboard currently shows. Starts from the factory readouts
/// and only ever moves forward when a valid value arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub status_on_value: f64,
    pub anti_sway_value: String,
    pub braking_on_value: f64,
    pub total_on_time: f64,
    pub hoist_time: f64,
    pub trolley_time: f64,
    pub long_travel_time: f64,
    pub hoist_overload: f64,
    pub trolley_overload: f64,
    pub long_travel_overload: f64,
    pub hoist_pulse: f64,
    pub trolley_pulse: f64,
    pub long_travel_pulse: f64,
    #[serde(rename = "dataDashboard")]
    pub counters: DashboardCounters,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            status_on_value: 1860.0,
            anti_sway_value: "ON".to_string(),
            braking_on_value: 699.0,
            total_on_time: 1860.0,
            hoist_time: 55.0,
            trolley_time: 127.0,
            long_travel_time: 57.0,
            hoist_overload: 60.0,
            trolley_overload: 15.0,
            long_travel_overload: 25.0,
            hoist_pulse: 355.0,
            trolley_pulse: 151.0,
            long_travel_pulse: 122.0,
            counters: DashboardCounters::default(),
        }
    }
}

impl TelemetrySnapshot {
    pub fn get(&self, metric: Metric) -> FieldValue {
        let c = &self.counters;
        match metric {
            Metric::StatusOnValue => FieldValue::Number(self.status_on_value),
            Metric::AntiSwayValue => FieldValue::Text(self.anti_sway_value.clone()),
            Metric::BrakingOnValue => FieldValue::Number(self.braking_on_value),
            Metric::TotalOnTime => FieldValue::Number(self.total_on_time),
            Metric::HoistTime => FieldValue::Number(self.hoist_time),
            Metric::TrolleyTime => FieldValue::Number(self.trolley_time),
            Metric::LongTravelTime => FieldValue::Number(self.long_travel_time),
            Metric::HoistOverload => FieldValue::Number(self.hoist_overload),
            Metric::TrolleyOverload => FieldValue::Number(self.trolley_overload),
            Metric::LongTravelOverload => FieldValue::Number(self.long_travel_overload),
            Metric::HoistPulse => FieldValue::Number(self.hoist_pulse),
            Metric::TrolleyPulse => FieldValue::Number(self.trolley_pulse),
            Metric::LongTravelPulse => FieldValue::Number(self.long_travel_pulse),
            Metric::RunningTimeTotal => FieldValue::Number(c.running_time_total),
            Metric::MaintenanceDueDate => FieldValue::Text(c.maintenance_due_date.clone()),
            Metric::PushPulseCount => FieldValue::Number(c.push_pulse_count),
            Metric::BacktrackingCount => FieldValue::Number(c.backtracking_count),
            Metric::ReversalCount => FieldValue::Number(c.reversal_count),
            Metric::AlarmCount => FieldValue::Number(c.alarm_count),
            Metric::BrakingLifetimeRemain => FieldValue::Number(c.braking_lifetime_remain),
            Metric::BrakingTimeTotal => FieldValue::Number(c.braking_time_total),
            Metric::BrakingReplacementCount => FieldValue::Number(c.braking_replacement_count),
            Metric::Current => FieldValue::Number(c.current),
            Metric::Overcurrent => FieldValue::Flag(c.overcurrent),
            Metric::Overvoltage => FieldValue::Flag(c.overvoltage),
            Metric::InverterOverloadError => FieldValue::Flag(c.inverter_overload_error),
        }
    }

    /// Writes `value` into the field for `metric`. Returns `true` when the
    /// stored value changed. A value of the wrong kind is ignored.
    pub fn set(&mut self, metric: Metric, value: FieldValue) -> bool {
        match value {
            FieldValue::Number(v) => match self.number_slot(metric) {
                Some(slot) if *slot != v => {
                    *slot = v;
                    true
                }
                _ => false,
            },
            FieldValue::Flag(v) => match self.flag_slot(metric) {
                Some(slot) if *slot != v => {
                    *slot = v;
                    true
                }
                _ => false,
            },
            FieldValue::Text(v) => match self.text_slot(metric) {
                Some(slot) if *slot != v => {
                    *slot = v;
                    true
                }
                _ => false,
            },
        }
    }

    fn number_slot(&mut self, metric: Metric) -> Option<&mut f64> {
        let c = &mut self.counters;
        match metric {
            Metric::StatusOnValue => Some(&mut self.status_on_value),
            Metric::BrakingOnValue => Some(&mut self.braking_on_value),
            Metric::TotalOnTime => Some(&mut self.total_on_time),
            Metric::HoistTime => Some(&mut self.hoist_time),
            Metric::TrolleyTime => Some(&mut self.trolley_time),
            Metric::LongTravelTime => Some(&mut self.long_travel_time),
            Metric::HoistOverload => Some(&mut self.hoist_overload),
            Metric::TrolleyOverload => Some(&mut self.trolley_overload),
            Metric::LongTravelOverload => Some(&mut self.long_travel_overload),
            Metric::HoistPulse => Some(&mut self.hoist_pulse),
            Metric::TrolleyPulse => Some(&mut self.trolley_pulse),
            Metric::LongTravelPulse => Some(&mut self.long_travel_pulse),
            Metric::RunningTimeTotal => Some(&mut c.running_time_total),
            Metric::PushPulseCount => Some(&mut c.push_pulse_count),
            Metric::BacktrackingCount => Some(&mut c.backtracking_count),
            Metric::ReversalCount => Some(&mut c.reversal_count),
            Metric::AlarmCount => Some(&mut c.alarm_count),
            Metric::BrakingLifetimeRemain => Some(&mut c.braking_lifetime_remain),
            Metric::BrakingTimeTotal => Some(&mut c.braking_time_total),
            Metric::BrakingReplacementCount => Some(&mut c.braking_replacement_count),
            Metric::Current => Some(&mut c.current),
            Metric::AntiSwayValue
            | Metric::MaintenanceDueDate
            | Metric::Overcurrent
            | Metric::Overvoltage
            | Metric::InverterOverloadError => None,
        }
    }

    fn flag_slot(&mut self, metric: Metric) -> Option<&mut bool> {
        let c = &mut self.counters;
        match metric {
            Metric::Overcurrent => Some(&mut c.overcurrent),
            Metric::Overvoltage => Some(&mut c.overvoltage),
            Metric::InverterOverloadError => Some(&mut c.inverter_overload_error),
            _ => None,
        }
    }

    fn text_slot(&mut self, metric: Metric) -> Option<&mut String> {
        match metric {
            Metric::AntiSwayValue => Some(&mut self.anti_sway_value),
            Metric::MaintenanceDueDate => Some(&mut self.counters.maintenance_due_date),
            _ => None,
        }
    }
}

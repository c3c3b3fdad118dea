//! Таблицы, уже приведённые к каноническому виду (используются в тестах и при встраивании)

use super::{CircuitRow, ConstructorRow, DriverRow, EntryRow, LapRow, NationalityCodes, RawTables, SessionRow};
use crate::types::RaceVariant;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTables {
    pub sessions: Vec<SessionRow>,
    pub entries: Vec<EntryRow>,
    pub laps: Vec<LapRow>,
    pub drivers: Vec<DriverRow>,
    pub constructors: Vec<ConstructorRow>,
    pub circuits: Vec<CircuitRow>,
}

impl RawTables for InMemoryTables {
    fn schema_name(&self) -> &'static str {
        "in-memory"
    }

    fn sessions(&self, _variant: RaceVariant) -> Vec<SessionRow> {
        self.sessions.clone()
    }

    fn entries(&self, _variant: RaceVariant) -> Vec<EntryRow> {
        self.entries.clone()
    }

    fn laps(&self, _variant: RaceVariant) -> Vec<LapRow> {
        self.laps.clone()
    }

    fn drivers(&self) -> Vec<DriverRow> {
        self.drivers.clone()
    }

    fn constructors(&self) -> Vec<ConstructorRow> {
        self.constructors.clone()
    }

    fn circuits(&self) -> Vec<CircuitRow> {
        self.circuits.clone()
    }

    fn nationality_codes(&self) -> NationalityCodes {
        NationalityCodes::AlreadyCoded
    }
}

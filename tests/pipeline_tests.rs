//! End-to-end runs of the normalization pipeline over in-memory and on-disk tables.

use chrono::NaiveDate;
use race_outcome_ml::pipeline::Pipeline;
use race_outcome_ml::sources::{
    load_tables, AuxiliaryTables, CircuitRow, ConstructorRow, DriverRow, EntryRow, InMemoryTables,
    SchemaKind, SessionRow,
};
use race_outcome_ml::{Classification, FeatureValue, PipelineConfig, PipelineError, RaceVariant, SessionKind};

// ============================================================================
// Fixtures
// ============================================================================

fn entry(id: i64, driver: i64, laps: i64, duration_ms: i64, status: &str) -> EntryRow {
    EntryRow {
        id: Some(id),
        session_id: Some(1),
        driver_id: Some(driver),
        constructor_id: Some(1),
        grid: Some(driver),
        reported_laps: Some(laps),
        duration_text: None,
        duration_ms: Some(duration_ms),
        classification: Classification {
            is_classified: None,
            status: Some(status.to_string()),
        },
    }
}

fn bahrain(entries: Vec<EntryRow>) -> InMemoryTables {
    InMemoryTables {
        sessions: vec![SessionRow {
            id: Some(1),
            kind: SessionKind::Race,
            cancelled: false,
            circuit_id: Some(1),
            round_date: NaiveDate::from_ymd_opt(2021, 3, 28),
            session_date: None,
        }],
        entries,
        laps: Vec::new(),
        drivers: vec![
            DriverRow {
                id: Some(1),
                reference: Some("hamilton".into()),
                date_of_birth: NaiveDate::from_ymd_opt(1985, 1, 7),
                nationality: Some("GBR".into()),
            },
            DriverRow {
                id: Some(2),
                reference: Some("verstappen".into()),
                date_of_birth: NaiveDate::from_ymd_opt(1997, 9, 30),
                nationality: Some("NLD".into()),
            },
            DriverRow {
                id: Some(3),
                reference: Some("bottas".into()),
                date_of_birth: None,
                nationality: None,
            },
        ],
        constructors: vec![ConstructorRow {
            id: Some(1),
            reference: Some("mercedes".into()),
            nationality: Some("DEU".into()),
        }],
        circuits: vec![CircuitRow {
            id: Some(1),
            reference: Some("bahrain".into()),
            country: Some("BHR".into()),
        }],
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default()).unwrap()
}

// ============================================================================
// Main race
// ============================================================================

#[test]
fn test_lapped_finisher_is_extrapolated_and_ranked() {
    let tables = bahrain(vec![
        entry(10, 1, 58, 5_400_000, "Finished"),
        entry(11, 2, 56, 5_410_000, "+2 Laps"),
    ]);
    let output = pipeline().run(RaceVariant::MainRace, &tables, &AuxiliaryTables::default());

    assert_eq!(output.deviations.len(), 2);
    let a = &output.deviations[0];
    let b = &output.deviations[1];
    assert_eq!(a.final_duration_ms, 5_400_000);
    assert_eq!(b.final_duration_ms, 5_603_214);
    assert_eq!(a.median_duration_ms, 5_501_607);
    assert_eq!(a.deviation_from_median_ms, -101_607);
    assert_eq!(b.deviation_from_median_ms, 101_607);
    assert_eq!((a.final_position, b.final_position), (1, 2));

    for d in &output.deviations {
        assert_eq!(d.deviation_from_median_ms, d.final_duration_ms - d.median_duration_ms);
    }

    let first = &output.features[0];
    assert_eq!(first.get("driver"), Some(&FeatureValue::Text("hamilton".into())));
    assert_eq!(first.get("laps"), Some(&FeatureValue::Int(58)));
    assert_eq!(first.get("final_position"), Some(&FeatureValue::Int(1)));
    assert_eq!(first.get("qualification_position"), Some(&FeatureValue::Int(1)));
    assert_eq!(first.get("race_year"), Some(&FeatureValue::Int(2021)));
    assert_eq!(first.get("days_since_first_event"), Some(&FeatureValue::Int(0)));
    assert_eq!(first.get("driver_home"), Some(&FeatureValue::Int(0)));
}

#[test]
fn test_non_finishers_leave_the_main_race_table() {
    let tables = bahrain(vec![
        entry(10, 1, 58, 5_400_000, "Finished"),
        entry(11, 2, 58, 5_401_000, "Finished"),
        entry(12, 3, 40, 3_800_000, "Gearbox"),
    ]);
    let output = pipeline().run(RaceVariant::MainRace, &tables, &AuxiliaryTables::default());
    let drivers: Vec<String> = output
        .features
        .iter()
        .filter_map(|row| match row.get("driver") {
            Some(FeatureValue::Text(d)) => Some(d.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(drivers, vec!["hamilton", "verstappen"]);

    let config = PipelineConfig {
        retain_non_finishers: true,
        main_race_bounds: race_outcome_ml::config::DeviationBounds { lower: None, upper: None },
        ..PipelineConfig::default()
    };
    let output = Pipeline::new(config)
        .unwrap()
        .run(RaceVariant::MainRace, &tables, &AuxiliaryTables::default());
    assert_eq!(output.features.len(), 3);
    // медиана по финишировавшим не меняется из-за сошедшего
    assert!(output.deviations.iter().all(|d| d.median_duration_ms == 5_400_500));
}

#[test]
fn test_event_without_finishers_produces_no_rows() {
    let tables = bahrain(vec![
        entry(10, 1, 30, 3_000_000, "Accident"),
        entry(11, 2, 31, 3_100_000, "Collision"),
    ]);
    let output = pipeline().run(RaceVariant::MainRace, &tables, &AuxiliaryTables::default());
    assert!(output.features.is_empty());
    assert!(output.pick_lists.drivers.is_empty());
}

#[test]
fn test_short_runs_fall_below_lap_threshold() {
    let tables = bahrain(vec![
        entry(10, 1, 58, 5_400_000, "Finished"),
        entry(11, 2, 9, 900_000, "+49 Laps"),
    ]);
    let output = pipeline().run(RaceVariant::MainRace, &tables, &AuxiliaryTables::default());
    assert_eq!(output.deviations.len(), 1);
    assert_eq!(output.deviations[0].deviation_from_median_ms, 0);
}

// ============================================================================
// Status
// ============================================================================

#[test]
fn test_status_labels() {
    let tables = bahrain(vec![
        entry(10, 1, 58, 5_400_000, "Finished"),
        entry(11, 2, 57, 5_420_000, "+1 Lap"),
        entry(12, 3, 12, 1_000_000, "Accident"),
    ]);
    let output = pipeline().run(RaceVariant::Status, &tables, &AuxiliaryTables::default());
    let labels: Vec<(String, i64)> = output
        .features
        .iter()
        .map(|row| {
            let driver = row.get("driver").map(ToString::to_string).unwrap_or_default();
            let dnf = match row.get("dnf") {
                Some(FeatureValue::Int(v)) => *v,
                other => panic!("unexpected dnf value {other:?}"),
            };
            (driver, dnf)
        })
        .collect();
    assert_eq!(
        labels,
        vec![("bottas".to_string(), 1), ("hamilton".to_string(), 0), ("verstappen".to_string(), 0)]
    );
    assert!(output.deviations.is_empty());
    // пропущенная национальность не удаляет строку
    assert_eq!(output.features[0].get("driver_nationality"), Some(&FeatureValue::Missing));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_repeated_runs_write_identical_bytes() {
    let tables = bahrain(vec![
        entry(10, 1, 58, 5_400_000, "Finished"),
        entry(11, 2, 56, 5_410_000, "+2 Laps"),
        entry(12, 3, 58, 5_405_000, "Finished"),
    ]);
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            processed_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        for variant in RaceVariant::ALL {
            let output = pipeline.run(variant, &tables, &AuxiliaryTables::default());
            pipeline.persist(variant, &output).unwrap();
        }
        let table = std::fs::read(dir.path().join(RaceVariant::MainRace.output_file_name())).unwrap();
        let status = std::fs::read(dir.path().join(RaceVariant::Status.output_file_name())).unwrap();
        let drivers = std::fs::read(dir.path().join("features_helper").join("drivers_mainrace.csv")).unwrap();
        outputs.push((table, status, drivers));
    }
    assert_eq!(outputs[0], outputs[1]);
    assert!(!outputs[0].0.is_empty());
}

// ============================================================================
// Legacy dump on disk
// ============================================================================

const RACES: &str = "raceId,year,round,circuitId,name,date\n1,2021,7,1,French Grand Prix,2021-06-20\n2,1979,1,1,Old Grand Prix,1979-07-01\n";

const RESULTS: &str = r#"resultId,raceId,driverId,constructorId,number,grid,position,laps,time,milliseconds,statusId
10,1,1,1,33,1,1,53,1:27:25.770,5245770,1
11,1,2,2,44,2,2,53,+2.904,5248674,1
12,1,3,3,14,9,\N,20,\N,\N,5
13,2,3,3,14,1,1,54,1:30:00.000,5400000,1
"#;

const QUALIFYING: &str = r#"qualifyId,raceId,driverId,constructorId,number,position,q1,q2,q3
100,1,1,1,33,1,1:30.500,1:30.000,1:29.990
101,1,2,2,44,2,1:30.700,1:30.100,\N
"#;

const DRIVERS: &str = r#"driverId,driverRef,number,code,forename,surname,dob,nationality,url
1,max_verstappen,33,VER,Max,Verstappen,1997-09-30,Dutch,http://example.com
2,hamilton,44,HAM,Lewis,Hamilton,1985-01-07,British,http://example.com
3,alonso,14,ALO,Fernando,Alonso,1981-07-29,Spanish,http://example.com
"#;

const CONSTRUCTORS: &str = r#"constructorId,constructorRef,name,nationality,url
1,red_bull,Red Bull,Austrian,http://example.com
2,mercedes,Mercedes,West German,http://example.com
3,alpine,Alpine F1 Team,French,http://example.com
"#;

const CIRCUITS: &str = r#"circuitId,circuitRef,name,location,country,lat,lng,alt,url
1,ricard,Circuit Paul Ricard,Le Castellet,France,43.25,5.79,432,http://example.com
"#;

const COUNTRIES: &str = r#"num_code,alpha_2_code,alpha_3_code,en_short_name,nationality
528,NL,NLD,Netherlands,Dutch
826,GB,GBR,United Kingdom of Great Britain and Northern Ireland,"British, UK"
724,ES,ESP,Spain,Spanish
40,AT,AUT,Austria,Austrian
276,DE,DEU,Germany,German
250,FR,FRA,France,French
"#;

fn write_legacy_dump(dir: &std::path::Path) {
    let files = [
        ("races.csv", RACES),
        ("results.csv", RESULTS),
        ("qualifying.csv", QUALIFYING),
        ("drivers.csv", DRIVERS),
        ("constructors.csv", CONSTRUCTORS),
        ("circuits.csv", CIRCUITS),
        ("status.csv", "statusId,status\n1,Finished\n5,Engine\n"),
        ("lap_times.csv", "raceId,driverId,lap,position,time,milliseconds\n"),
        ("countries.csv", COUNTRIES),
        ("race_weather.csv", "date,weather\n2021-06-20,Sunny\n1979-07-01,Rain\n"),
    ];
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

#[test]
fn test_legacy_main_race_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    write_legacy_dump(dir.path());

    let tables = load_tables(SchemaKind::Legacy, dir.path()).unwrap();
    let aux = AuxiliaryTables::load(dir.path()).unwrap();
    assert!(aux.circuit_types.is_none());

    let output = pipeline().run(RaceVariant::MainRace, tables.as_ref(), &aux);
    let deviations: Vec<i64> = output.deviations.iter().map(|d| d.deviation_from_median_ms).collect();
    assert_eq!(deviations, vec![-1_452, 1_452]);

    let first = &output.features[0];
    assert_eq!(first.get("driver"), Some(&FeatureValue::Text("max_verstappen".into())));
    assert_eq!(first.get("driver_nationality"), Some(&FeatureValue::Text("NLD".into())));
    assert_eq!(first.get("circuit_nationality"), Some(&FeatureValue::Text("FRA".into())));
    assert_eq!(first.get("rain"), Some(&FeatureValue::Int(0)));
    assert_eq!(first.get("circuit_type"), Some(&FeatureValue::Missing));
    let second = &output.features[1];
    assert_eq!(second.get("constructor_nationality"), Some(&FeatureValue::Text("DEU".into())));

    // гонка 1979 года отфильтрована, но задаёт дату первого старта Алонсо в истории
    let alonso = output.records.iter().find(|r| r.driver == "alonso");
    assert_eq!(alonso.and_then(|r| r.first_event_date), NaiveDate::from_ymd_opt(1979, 7, 1));
    assert!(output.records.iter().all(|r| r.event.race_year >= 1981));
}

#[test]
fn test_legacy_qualifying_uses_best_segment() {
    let dir = tempfile::tempdir().unwrap();
    write_legacy_dump(dir.path());
    let tables = load_tables(SchemaKind::Legacy, dir.path()).unwrap();

    let output = pipeline().run(RaceVariant::Qualifying, tables.as_ref(), &AuxiliaryTables::default());
    assert_eq!(output.deviations.len(), 2);
    assert_eq!(output.deviations[0].final_duration_ms, 89_990);
    assert_eq!(output.deviations[0].median_duration_ms, 90_045);
    assert_eq!(output.features[1].get("deviation_from_median_ms"), Some(&FeatureValue::Int(55)));
    assert_eq!(output.features[0].get("rain"), None);
}

#[test]
fn test_legacy_status_keeps_retirements() {
    let dir = tempfile::tempdir().unwrap();
    write_legacy_dump(dir.path());
    let tables = load_tables(SchemaKind::Legacy, dir.path()).unwrap();

    let output = pipeline().run(RaceVariant::Status, tables.as_ref(), &AuxiliaryTables::default());
    let dnf: Vec<String> = output
        .features
        .iter()
        .map(|row| format!("{}={}", row.get("driver").unwrap(), row.get("dnf").unwrap()))
        .collect();
    assert_eq!(dnf, vec!["alonso=1", "hamilton=0", "max_verstappen=0"]);
}

#[test]
fn test_missing_required_table_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_legacy_dump(dir.path());
    std::fs::remove_file(dir.path().join("countries.csv")).unwrap();

    let err = load_tables(SchemaKind::Legacy, dir.path()).err().unwrap();
    assert!(matches!(err, PipelineError::MissingTable { table: "countries", .. }));
}

// ============================================================================
// New dump on disk
// ============================================================================

const SESSION_ENTRIES: &str = r#"id,session_id,round_entry_id,is_classified,status,detail,grid,time,laps_completed
1000,10,100,t,0,Finished,1,00:18:05.000,12
1001,10,101,t,0,Finished,2,00:17:58.000,3
1002,10,102,t,1,Engine,3,\N,11
1003,10,103,f,1,Accident,4,\N,2
2001,11,100,\N,\N,\N,\N,\N,\N
2002,12,100,\N,\N,\N,\N,\N,\N
2003,13,100,\N,\N,\N,\N,\N,\N
2011,11,101,\N,\N,\N,\N,\N,\N
2012,12,101,\N,\N,\N,\N,\N,\N
2013,13,101,\N,\N,\N,\N,\N,\N
2021,11,102,\N,\N,\N,\N,\N,\N
2031,11,103,\N,\N,\N,\N,\N,\N
"#;

fn jolpica_laps() -> String {
    let mut laps: Vec<(i64, &str)> = Vec::new();
    laps.extend(std::iter::repeat((1000, "00:01:30.000")).take(12));
    laps.extend(std::iter::repeat((1001, "00:01:29.500")).take(12));
    laps.extend(std::iter::repeat((1002, "00:01:31.000")).take(11));
    laps.extend(std::iter::repeat((1003, "00:01:35.000")).take(2));
    laps.extend([
        (2001, "00:01:28.500"),
        (2001, "00:01:28.000"),
        (2002, "00:01:27.600"),
        (2003, "00:01:27.100"),
        (2011, "00:01:28.200"),
        (2012, "00:01:27.300"),
        (2013, "00:01:26.900"),
        (2013, "\\N"),
        (2021, "00:01:28.800"),
        (2021, "00:01:29.000"),
        (2031, "\\N"),
    ]);

    let mut csv = String::from("id,session_entry_id,number,time\n");
    for (id, (entry, time)) in laps.into_iter().enumerate() {
        csv.push_str(&format!("{},{},{},{}\n", id + 1, entry, id + 1, time));
    }
    csv
}

fn write_jolpica_dump(raw: &std::path::Path) {
    let dir = raw.join("jolpica-dump");
    std::fs::create_dir_all(&dir).unwrap();
    let laps = jolpica_laps();
    let files = [
        ("formula_one_round.csv", "id,circuit_id,date,is_cancelled\n1,7,2023-07-09,f\n"),
        (
            "formula_one_session.csv",
            "id,round_id,type,date,is_cancelled\n10,1,R,2023-07-09,f\n11,1,Q1,2023-07-08,f\n12,1,Q2,2023-07-08,f\n13,1,Q3,2023-07-08,f\n",
        ),
        (
            "formula_one_roundentry.csv",
            "id,round_id,team_driver_id,car_number\n100,1,500,44\n101,1,501,1\n102,1,502,4\n103,1,503,2\n",
        ),
        ("formula_one_sessionentry.csv", SESSION_ENTRIES),
        (
            "formula_one_teamdriver.csv",
            "id,team_id,driver_id,season_id\n500,9,20,2023\n501,8,21,2023\n502,7,22,2023\n503,6,23,2023\n",
        ),
        (
            "formula_one_driver.csv",
            "id,reference,country_code,date_of_birth\n20,hamilton,GBR,1985-01-07\n21,max_verstappen,NLD,1997-09-30\n22,norris,GBR,1999-11-13\n23,sargeant,USA,2000-12-31\n",
        ),
        (
            "formula_one_team.csv",
            "id,reference,country_code\n9,mercedes,DEU\n8,red_bull,AUT\n7,mclaren,GBR\n6,williams,GBR\n",
        ),
        ("formula_one_circuit.csv", "id,reference,country_code\n7,silverstone,GBR\n"),
        ("formula_one_lap.csv", laps.as_str()),
    ];
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

fn drivers_of(output: &race_outcome_ml::VariantOutput) -> Vec<String> {
    output.features.iter().map(|row| row.get("driver").unwrap().to_string()).collect()
}

#[test]
fn test_jolpica_main_race_from_lap_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_jolpica_dump(dir.path());
    let tables = load_tables(SchemaKind::Jolpica, dir.path()).unwrap();

    let output = pipeline().run(RaceVariant::MainRace, tables.as_ref(), &AuxiliaryTables::default());
    // sargeant отсекается порогом кругов
    assert_eq!(drivers_of(&output), vec!["max_verstappen", "hamilton", "norris"]);

    let hamilton = output.records.iter().find(|r| r.driver == "hamilton").unwrap();
    assert_eq!(hamilton.reported_duration_ms, Some(1_085_000));
    assert_eq!(hamilton.summed_lap_duration_ms, 1_080_000);
    let verstappen = output.records.iter().find(|r| r.driver == "max_verstappen").unwrap();
    assert_eq!(verstappen.reported_laps, Some(3));
    assert_eq!(verstappen.laps_completed, 12);

    let finals: Vec<i64> = output.deviations.iter().map(|d| d.final_duration_ms).collect();
    assert_eq!(finals, vec![1_074_000, 1_080_000, 1_092_000]);
    assert!(output.deviations.iter().all(|d| d.median_duration_ms == 1_080_000));
    let deviations: Vec<i64> = output.deviations.iter().map(|d| d.deviation_from_median_ms).collect();
    assert_eq!(deviations, vec![-6_000, 0, 12_000]);

    let norris = &output.features[2];
    assert_eq!(norris.get("final_position"), Some(&FeatureValue::Int(3)));
    assert_eq!(norris.get("laps"), Some(&FeatureValue::Int(12)));
    assert_eq!(norris.get("driver_home"), Some(&FeatureValue::Int(1)));
    assert_eq!(output.features[0].get("driver_home"), Some(&FeatureValue::Int(0)));
}

#[test]
fn test_jolpica_classified_retiree_counts_as_finisher() {
    let dir = tempfile::tempdir().unwrap();
    write_jolpica_dump(dir.path());
    let tables = load_tables(SchemaKind::Jolpica, dir.path()).unwrap();

    let output = pipeline().run(RaceVariant::Status, tables.as_ref(), &AuxiliaryTables::default());
    let dnf: Vec<String> = output
        .features
        .iter()
        .map(|row| format!("{}={}", row.get("driver").unwrap(), row.get("dnf").unwrap()))
        .collect();
    assert_eq!(dnf, vec!["hamilton=0", "max_verstappen=0", "norris=0", "sargeant=1"]);
}

#[test]
fn test_jolpica_qualifying_folds_segments() {
    let dir = tempfile::tempdir().unwrap();
    write_jolpica_dump(dir.path());
    let tables = load_tables(SchemaKind::Jolpica, dir.path()).unwrap();

    let output = pipeline().run(RaceVariant::Qualifying, tables.as_ref(), &AuxiliaryTables::default());
    // семь записей участия Q1-Q3 дают одну строку на гонщика; без времени круга строки нет
    assert_eq!(output.records.len(), 3);
    assert_eq!(drivers_of(&output), vec!["max_verstappen", "hamilton", "norris"]);

    let finals: Vec<i64> = output.deviations.iter().map(|d| d.final_duration_ms).collect();
    assert_eq!(finals, vec![86_900, 87_100, 88_800]);
    assert!(output.deviations.iter().all(|d| d.median_duration_ms == 87_100));
    let deviations: Vec<i64> = output.deviations.iter().map(|d| d.deviation_from_median_ms).collect();
    assert_eq!(deviations, vec![-200, 0, 1_700]);
    assert_eq!(output.features[0].get("race_day"), Some(&FeatureValue::Int(8)));
}

#![allow(non_snake_case, dead_code)]

use std::path::PathBuf;

use mbinbridge_host::mock::MockHost;
use mbinbridge_host::{HostError, HostSession, RuntimeHost, SessionLayout};
use mbinbridge_sdk::{names, ClassRef, HostException, HostValue, IntWidth, ObjectRef, PrimitiveType};

use super::*;
use crate::{HostEnum, HostRecord};

const NS: &str = "libMBIN.NMS.GameComponents";

#[derive(Debug, Clone, Copy, PartialEq, Eq, HostEnum)]
#[repr(i32)]
#[host_enum(name = "libMBIN.NMS.GameComponents.GcBiomeType")]
enum GcBiomeType {
    Lush = 0,
    Toxic = 1,
    Scorched = 2,
}

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS", class = "Colour")]
struct Colour {
    R: f32,
    G: f32,
    B: f32,
    A: f32,
}

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcPlanetData")]
struct GcPlanetData {
    Name: String,
    Seed: u64,
    Active: bool,
    Scale: f64,
    Biome: GcBiomeType,
    Tint: Colour,
    Weights: [f32; 4],
    Counts: Vec<i32>,
    Palette: Vec<Colour>,
    Biomes: Vec<GcBiomeType>,
}

struct Fixture {
    mock: MockHost,
    session: HostSession,
    planet: ClassRef,
    colour: ClassRef,
}

fn fixture() -> Fixture {
    let mock = MockHost::new();
    let session =
        HostSession::open(Box::new(mock.clone()), &SessionLayout::new("libMBIN.dll")).unwrap();

    let float = mock.primitive(PrimitiveType::F32);
    let colour = mock.define_class("libMBIN.NMS", "Colour");
    for channel in ["R", "G", "B", "A"] {
        mock.add_field(colour, channel, float);
    }

    let biome = mock.define_enum(
        NS,
        "GcBiomeType",
        IntWidth::I32,
        &[("Lush", 0), ("Toxic", 1), ("Scorched", 2)],
    );

    let planet = mock.define_class(NS, "GcPlanetData");
    mock.add_sized_field(planet, "Name", mock.primitive(PrimitiveType::String), 0x20);
    mock.add_field(planet, "Seed", mock.primitive(PrimitiveType::U64));
    mock.add_field(planet, "Active", mock.primitive(PrimitiveType::Bool));
    mock.add_field(planet, "Scale", mock.primitive(PrimitiveType::F64));
    mock.add_field(planet, "Biome", biome);
    mock.add_field(planet, "Tint", colour);
    mock.add_sized_field(planet, "Weights", mock.array_of(float), 4);
    mock.add_field(planet, "Counts", mock.list_of(mock.primitive(PrimitiveType::I32)));
    mock.add_field(planet, "Palette", mock.list_of(colour));
    mock.add_field(planet, "Biomes", mock.list_of(biome));

    Fixture {
        mock,
        session,
        planet,
        colour,
    }
}

fn colour(r: f32) -> Colour {
    Colour {
        R: r,
        G: 0.5,
        B: 0.25,
        A: 1.0,
    }
}

fn sample() -> GcPlanetData {
    GcPlanetData {
        Name: "Eissentam".to_string(),
        Seed: 0xDEAD_BEEF_0000_0001,
        Active: true,
        Scale: 2.5,
        Biome: GcBiomeType::Toxic,
        Tint: colour(0.1),
        Weights: [1.0, 2.0, 3.0, 4.0],
        Counts: vec![1, 2, 3, 4, 5],
        Palette: vec![colour(0.2), colour(0.3)],
        Biomes: vec![GcBiomeType::Scorched, GcBiomeType::Lush],
    }
}

fn exception() -> HostException {
    HostException::new("System.InvalidOperationException", "Operation is not valid")
}

#[test]
fn test_round_trip_every_field_kind() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let value = sample();

    let handle = push_new(&cx, &value).unwrap();
    let obj = handle.object().unwrap();
    assert_eq!(fx.mock.object_class(obj).unwrap(), fx.planet);

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read, value);

    assert_eq!(fx.mock.get(obj, "Biome"), HostValue::I32(1));
    let HostValue::Object(name) = fx.mock.get(obj, "Name") else {
        panic!("Name is not a string object");
    };
    assert_eq!(fx.mock.text(name).as_deref(), Some("Eissentam"));
}

#[test]
fn test_zero_record_round_trip() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let value = GcPlanetData::zero();

    let handle = push_new(&cx, &value).unwrap();
    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read, value);
    assert_eq!(read.Biome, GcBiomeType::Lush);
}

#[test]
fn test_read_defaults_from_fresh_object() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let obj = fx.mock.instantiate(fx.planet);

    let read: GcPlanetData = read_from_host(&cx, &ResourceHandle::from_object(obj)).unwrap();
    assert_eq!(read, GcPlanetData::zero());
}

#[test]
fn test_list_overwrite_shorter() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = push_new(&cx, &sample()).unwrap();
    let obj = handle.object().unwrap();
    let list_before = fx.mock.get(obj, "Counts");

    let mut value = sample();
    value.Counts = vec![9, 8];
    value.Palette.truncate(1);
    write_to_host(&cx, &value, &handle).unwrap();

    let list_after = fx.mock.get(obj, "Counts");
    assert_eq!(list_before, list_after);
    let HostValue::Object(list) = list_after else {
        panic!("Counts is not a list object");
    };
    assert_eq!(
        fx.mock.items(list).unwrap(),
        vec![HostValue::I32(9), HostValue::I32(8)]
    );

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read.Counts, vec![9, 8]);
    assert_eq!(read.Palette, vec![colour(0.2)]);
}

#[test]
fn test_list_overwrite_longer_and_empty() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = push_new(&cx, &sample()).unwrap();

    let mut value = sample();
    value.Counts = (0..12).collect();
    value.Biomes = Vec::new();
    write_to_host(&cx, &value, &handle).unwrap();

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read.Counts, (0..12).collect::<Vec<_>>());
    assert!(read.Biomes.is_empty());
}

#[test]
fn test_nested_record_reuses_existing_object() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = push_new(&cx, &sample()).unwrap();
    let obj = handle.object().unwrap();
    let tint_before = fx.mock.get(obj, "Tint");

    let mut value = sample();
    value.Tint = colour(0.9);
    write_to_host(&cx, &value, &handle).unwrap();

    assert_eq!(fx.mock.get(obj, "Tint"), tint_before);
    let HostValue::Object(tint) = tint_before else {
        panic!("Tint is not a record object");
    };
    assert_eq!(fx.mock.object_class(tint).unwrap(), fx.colour);
    assert_eq!(fx.mock.get(tint, "R"), HostValue::F32(0.9));
}

#[test]
fn test_fixed_array_length_mismatch() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = push_new(&cx, &sample()).unwrap();
    let obj = handle.object().unwrap();

    let float = fx.mock.primitive(PrimitiveType::F32);
    let short = fx
        .mock
        .new_array_with(float, vec![HostValue::F32(7.0), HostValue::F32(8.0)]);
    fx.mock.set(obj, "Weights", HostValue::Object(short));

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read.Weights, [7.0, 8.0, 0.0, 0.0]);

    write_to_host(&cx, &read, &handle).unwrap();
    let HostValue::Object(array) = fx.mock.get(obj, "Weights") else {
        panic!("Weights is not an array");
    };
    assert_ne!(array, short);
    assert_eq!(fx.mock.items(array).unwrap().len(), 4);
}

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcWeatherSet")]
struct GcWeatherSet {
    Options: [Colour; 3],
}

fn define_weather_set(fx: &Fixture) -> ClassRef {
    let weather = fx.mock.define_class(NS, "GcWeatherSet");
    fx.mock
        .add_sized_field(weather, "Options", fx.mock.array_of(fx.colour), 3);
    weather
}

#[test]
fn test_fixed_array_of_records_round_trip() {
    let fx = fixture();
    define_weather_set(&fx);
    let cx = MarshalContext::new(&fx.session);
    let value = GcWeatherSet {
        Options: [colour(0.1), colour(0.2), colour(0.3)],
    };

    let handle = push_new(&cx, &value).unwrap();
    let read: GcWeatherSet = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read, value);

    let HostValue::Object(array) = fx.mock.get(handle.object().unwrap(), "Options") else {
        panic!("Options is not an array object");
    };
    let items = fx.mock.items(array).unwrap();
    assert_eq!(items.len(), 3);
    for item in &items {
        let HostValue::Object(element) = *item else {
            panic!("array element is not an object");
        };
        assert_eq!(fx.mock.object_class(element).unwrap(), fx.colour);
    }
    assert_ne!(items[0], items[1]);
}

#[test]
fn test_fixed_array_of_records_edit_in_place() {
    let fx = fixture();
    define_weather_set(&fx);
    let cx = MarshalContext::new(&fx.session);
    let handle = push_new(
        &cx,
        &GcWeatherSet {
            Options: [colour(0.1), colour(0.2), colour(0.3)],
        },
    )
    .unwrap();
    let obj = handle.object().unwrap();
    let HostValue::Object(array) = fx.mock.get(obj, "Options") else {
        panic!("Options is not an array object");
    };
    let elements = fx.mock.items(array).unwrap();
    let objects = fx.mock.object_count();

    let mut edited: GcWeatherSet = read_from_host(&cx, &handle).unwrap();
    edited.Options[0].R = 0.9;
    write_to_host(&cx, &edited, &handle).unwrap();

    assert_eq!(fx.mock.get(obj, "Options"), HostValue::Object(array));
    assert_eq!(fx.mock.items(array).unwrap(), elements);
    assert_eq!(fx.mock.object_count(), objects);
    let HostValue::Object(first) = elements[0] else {
        panic!("array element is not an object");
    };
    assert_eq!(fx.mock.get(first, "R"), HostValue::F32(0.9));
    assert_eq!(read_from_host::<GcWeatherSet>(&cx, &handle).unwrap(), edited);
}

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcCave")]
struct GcCave {
    Depth: f32,
    Tunnel: Option<Box<GcTunnel>>,
}

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcTunnel")]
struct GcTunnel {
    Length: f32,
    Cave: Option<Box<GcCave>>,
}

#[test]
fn test_mutually_referencing_records() {
    let fx = fixture();
    let float = fx.mock.primitive(PrimitiveType::F32);
    let cave = fx.mock.define_class(NS, "GcCave");
    let tunnel = fx.mock.define_class(NS, "GcTunnel");
    fx.mock.add_field(cave, "Depth", float);
    fx.mock.add_field(cave, "Tunnel", tunnel);
    fx.mock.add_field(tunnel, "Length", float);
    fx.mock.add_field(tunnel, "Cave", cave);
    let cx = MarshalContext::new(&fx.session);

    assert_eq!(
        read_from_host::<GcCave>(&cx, &ResourceHandle::from_object(fx.mock.instantiate(cave)))
            .unwrap(),
        GcCave {
            Depth: 0.0,
            Tunnel: None
        }
    );

    let value = GcCave {
        Depth: 1.5,
        Tunnel: Some(Box::new(GcTunnel {
            Length: 12.0,
            Cave: None,
        })),
    };
    let handle = push_new(&cx, &value).unwrap();
    assert_eq!(read_from_host::<GcCave>(&cx, &handle).unwrap(), value);

    let obj = handle.object().unwrap();
    let HostValue::Object(inner) = fx.mock.get(obj, "Tunnel") else {
        panic!("Tunnel is not an object");
    };
    assert_eq!(fx.mock.object_class(inner).unwrap(), tunnel);
    assert_eq!(fx.mock.get(inner, "Cave"), HostValue::Null);

    write_to_host(
        &cx,
        &GcCave {
            Depth: 2.0,
            Tunnel: None,
        },
        &handle,
    )
    .unwrap();
    assert_eq!(fx.mock.get(obj, "Tunnel"), HostValue::Null);
}

#[test]
fn test_null_references_read_as_zero() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = push_new(&cx, &sample()).unwrap();
    let obj = handle.object().unwrap();

    fx.mock.set(obj, "Name", HostValue::Null);
    fx.mock.set(obj, "Tint", HostValue::Null);
    fx.mock.set(obj, "Counts", HostValue::Null);

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read.Name, "");
    assert_eq!(read.Tint, Colour::zero());
    assert!(read.Counts.is_empty());
}

#[test]
fn test_invalid_enum_value() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = push_new(&cx, &sample()).unwrap();
    fx.mock.set(handle.object().unwrap(), "Biome", HostValue::I32(7));

    let result = read_from_host::<GcPlanetData>(&cx, &handle);
    assert!(matches!(
        result,
        Err(MarshalError::InvalidEnumValue { value: 7, .. })
    ));
}

#[test]
fn test_unbound_handle() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = ResourceHandle::new("METADATA/PLANET.MBIN");

    assert!(matches!(
        read_from_host::<GcPlanetData>(&cx, &handle),
        Err(MarshalError::UnboundHandle)
    ));
    assert!(matches!(
        write_to_host(&cx, &sample(), &handle),
        Err(MarshalError::UnboundHandle)
    ));
}

#[test]
#[should_panic(expected = "used after release")]
fn test_released_handle_panics() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let mut handle = push_new(&cx, &sample()).unwrap();
    handle.release();
    let _ = read_from_host::<GcPlanetData>(&cx, &handle);
}

#[test]
fn test_list_add_failure_skips_element() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let int_list = fx.mock.list_of(fx.mock.primitive(PrimitiveType::I32));
    fx.mock.fail_method_on_call(int_list, names::ADD, 1, exception());

    let mut value = sample();
    value.Counts = vec![1, 2, 3];
    let handle = push_new(&cx, &value).unwrap();

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read.Counts, vec![1, 3]);
}

#[test]
fn test_list_element_constructor_failure_skips_element() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    // Colour constructor calls: Tint first, then one per palette entry
    fx.mock.fail_method_on_call(fx.colour, names::CTOR, 2, exception());

    let mut value = sample();
    value.Palette = vec![colour(0.2), colour(0.3), colour(0.4)];
    let handle = push_new(&cx, &value).unwrap();

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read.Palette, vec![colour(0.2), colour(0.4)]);
}

#[test]
fn test_list_item_failure_reads_zero() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let mut value = sample();
    value.Counts = vec![1, 2, 3];
    let handle = push_new(&cx, &value).unwrap();

    let int_list = fx.mock.list_of(fx.mock.primitive(PrimitiveType::I32));
    fx.mock.fail_method_on_call(int_list, names::GET_ITEM, 1, exception());

    let read: GcPlanetData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(read.Counts, vec![1, 0, 3]);
}

#[test]
fn test_immediate_edit_persists() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let pushed = push_new(&cx, &sample()).unwrap();
    fx.mock
        .store_file("METADATA/PLANET.MBIN", pushed.object().unwrap());

    let mut handle = ResourceHandle::new("METADATA/PLANET.MBIN");
    let edited = immediate_edit(&cx, &mut handle, |planet: &mut GcPlanetData| {
        planet.Seed = 99;
        planet.Counts.push(6);
    })
    .unwrap();

    assert!(handle.is_bound());
    assert_eq!(edited.Seed, 99);
    assert_eq!(
        fx.mock.writes(),
        vec![(
            names::WRITE_MBIN.to_string(),
            PathBuf::from("METADATA/PLANET.MBIN")
        )]
    );

    let stored = fx.mock.stored_file("METADATA/PLANET.MBIN").unwrap();
    let reread: GcPlanetData = read_from_host(&cx, &ResourceHandle::from_object(stored)).unwrap();
    assert_eq!(reread, edited);
    assert_eq!(reread.Counts, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_immediate_edit_missing_file() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let mut handle = ResourceHandle::new("METADATA/MISSING.MBIN");

    let result = immediate_edit(&cx, &mut handle, |planet: &mut GcPlanetData| planet.Seed = 1);
    assert!(matches!(result, Err(MarshalError::File(_))));
    assert!(fx.mock.writes().is_empty());
}

#[test]
fn test_immediate_edit_unsupported_extension() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let pushed = push_new(&cx, &sample()).unwrap();
    fx.mock.store_file("PLANET.JSON", pushed.object().unwrap());

    let mut handle = ResourceHandle::new("PLANET.JSON");
    let result = immediate_edit(&cx, &mut handle, |planet: &mut GcPlanetData| planet.Seed = 1);
    assert!(matches!(
        result,
        Err(MarshalError::File(FileError::UnsupportedExtension(_)))
    ));
}

// ============================================================================
// Schema drift
// ============================================================================

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcBiomeData")]
struct GcBiomeData {
    Fuel: f32,
    Heat: f32,
}

fn biome_fixture(host_fields: &[&str]) -> (MockHost, HostSession, ObjectRef) {
    let mock = MockHost::new();
    let session =
        HostSession::open(Box::new(mock.clone()), &SessionLayout::new("libMBIN.dll")).unwrap();
    let float = mock.primitive(PrimitiveType::F32);
    let class = mock.define_class(NS, "GcBiomeData");
    for name in host_fields {
        mock.add_field(class, name, float);
    }
    let obj = mock.instantiate(class);
    for (i, name) in host_fields.iter().enumerate() {
        mock.set(obj, name, HostValue::F32(i as f32 + 1.0));
    }
    (mock, session, obj)
}

#[test]
fn test_stale_schema_read_fails() {
    let (_, session, obj) = biome_fixture(&["Fuel", "Heat", "Radiation"]);
    let cx = MarshalContext::new(&session);

    let result = read_from_host::<GcBiomeData>(&cx, &ResourceHandle::from_object(obj));
    assert!(matches!(
        result,
        Err(MarshalError::FieldCountMismatch {
            host: 3,
            native: 2,
            ..
        })
    ));
}

#[test]
fn test_stale_schema_write_leaves_object_untouched() {
    let (mock, session, obj) = biome_fixture(&["Fuel", "Heat", "Radiation"]);
    let cx = MarshalContext::new(&session);
    let value = GcBiomeData {
        Fuel: 10.0,
        Heat: 20.0,
    };

    let result = write_to_host(&cx, &value, &ResourceHandle::from_object(obj));
    assert!(matches!(result, Err(MarshalError::FieldCountMismatch { .. })));
    assert_eq!(mock.get(obj, "Fuel"), HostValue::F32(1.0));
    assert_eq!(mock.get(obj, "Heat"), HostValue::F32(2.0));
    assert_eq!(mock.get(obj, "Radiation"), HostValue::F32(3.0));
}

#[test]
fn test_matching_schema_succeeds() {
    let (mock, session, obj) = biome_fixture(&["Fuel", "Heat"]);
    let cx = MarshalContext::new(&session);
    let handle = ResourceHandle::from_object(obj);

    let mut value: GcBiomeData = read_from_host(&cx, &handle).unwrap();
    assert_eq!(
        value,
        GcBiomeData {
            Fuel: 1.0,
            Heat: 2.0
        }
    );

    value.Fuel *= 2.0;
    write_to_host(&cx, &value, &handle).unwrap();
    assert_eq!(mock.get(obj, "Fuel"), HostValue::F32(2.0));
}

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcSpawnData")]
struct GcSpawnData {
    Count: i32,
    Biome: GcBiomeData,
}

#[test]
fn test_nested_stale_schema_preflight() {
    let (mock, session, _) = biome_fixture(&["Fuel", "Heat", "Radiation"]);
    let spawn = mock.define_class(NS, "GcSpawnData");
    mock.add_field(spawn, "Count", mock.primitive(PrimitiveType::I32));
    mock.add_field(spawn, "Biome", mock.find_class(NS, "GcBiomeData").unwrap());
    let obj = mock.instantiate(spawn);
    mock.set(obj, "Count", HostValue::I32(5));

    let cx = MarshalContext::new(&session);
    let value = GcSpawnData {
        Count: 6,
        Biome: GcBiomeData {
            Fuel: 1.0,
            Heat: 1.0,
        },
    };

    let result = write_to_host(&cx, &value, &ResourceHandle::from_object(obj));
    assert!(matches!(result, Err(MarshalError::FieldCountMismatch { .. })));
    assert_eq!(mock.get(obj, "Count"), HostValue::I32(5));
    assert_eq!(mock.get(obj, "Biome"), HostValue::Null);

    assert!(matches!(
        push_new(&cx, &value),
        Err(MarshalError::FieldCountMismatch { .. })
    ));
}

// ============================================================================
// Field matching
// ============================================================================

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcReordered")]
struct GcReordered {
    Radius: f32,
    Count: i32,
}

#[derive(Debug, Clone, PartialEq, HostRecord)]
#[record(namespace = "libMBIN.NMS.GameComponents", class = "GcReordered")]
struct GcRenamed {
    Radius: f32,
    Amount: i32,
}

fn reordered_fixture() -> (MockHost, HostSession, ObjectRef) {
    let mock = MockHost::new();
    let session =
        HostSession::open(Box::new(mock.clone()), &SessionLayout::new("libMBIN.dll")).unwrap();
    let class = mock.define_class(NS, "GcReordered");
    mock.add_field(class, "Count", mock.primitive(PrimitiveType::I32));
    mock.add_field(class, "Radius", mock.primitive(PrimitiveType::F32));
    let obj = mock.instantiate(class);
    mock.set(obj, "Count", HostValue::I32(4));
    mock.set(obj, "Radius", HostValue::F32(1.5));
    (mock, session, obj)
}

#[test]
fn test_positional_matching_ignores_names() {
    let (_, session, obj) = reordered_fixture();
    let cx = MarshalContext::new(&session);

    // The first native field (f32) is paired with the host's first field (i32).
    let result = read_from_host::<GcReordered>(&cx, &ResourceHandle::from_object(obj));
    assert!(matches!(
        result,
        Err(MarshalError::TypeMismatch {
            expected: "f32",
            found: "i32"
        })
    ));
}

#[test]
fn test_by_name_matching() {
    let (mock, session, obj) = reordered_fixture();
    let cx = MarshalContext::new(&session).with_matching(FieldMatching::ByName);
    let handle = ResourceHandle::from_object(obj);

    let value: GcReordered = read_from_host(&cx, &handle).unwrap();
    assert_eq!(
        value,
        GcReordered {
            Radius: 1.5,
            Count: 4
        }
    );

    write_to_host(
        &cx,
        &GcReordered {
            Radius: 3.0,
            Count: 8,
        },
        &handle,
    )
    .unwrap();
    assert_eq!(mock.get(obj, "Count"), HostValue::I32(8));
    assert_eq!(mock.get(obj, "Radius"), HostValue::F32(3.0));
}

#[test]
fn test_by_name_missing_field() {
    let (_, session, obj) = reordered_fixture();
    let cx = MarshalContext::new(&session).with_matching(FieldMatching::ByName);

    let result = read_from_host::<GcRenamed>(&cx, &ResourceHandle::from_object(obj));
    assert!(matches!(
        result,
        Err(MarshalError::FieldNotFound {
            field: "Amount",
            ..
        })
    ));
}

#[test]
fn test_context_caches_layouts() {
    let (_, session, obj) = biome_fixture(&["Fuel", "Heat"]);
    let cx = MarshalContext::new(&session);
    let handle = ResourceHandle::from_object(obj);

    for _ in 0..3 {
        read_from_host::<GcBiomeData>(&cx, &handle).unwrap();
    }
    assert_eq!(cx.layouts.len(), 1);
    assert_eq!(cx.drift_checked.len(), 1);
}

#[test]
fn test_drift_checked_per_record_type() {
    let mock = MockHost::new();
    let session =
        HostSession::open(Box::new(mock.clone()), &SessionLayout::new("libMBIN.dll")).unwrap();
    let class = mock.define_class(NS, "GcReordered");
    mock.add_field(class, "Radius", mock.primitive(PrimitiveType::F32));
    mock.add_field(class, "Count", mock.primitive(PrimitiveType::I32));
    let handle = ResourceHandle::from_object(mock.instantiate(class));
    let cx = MarshalContext::new(&session);

    read_from_host::<GcReordered>(&cx, &handle).unwrap();
    read_from_host::<GcRenamed>(&cx, &handle).unwrap();
    read_from_host::<GcRenamed>(&cx, &handle).unwrap();

    assert_eq!(cx.layouts.len(), 1);
    assert_eq!(cx.drift_checked.len(), 2);
    assert!(cx
        .drift_checked
        .contains(&(class, std::any::type_name::<GcRenamed>())));
}

#[test]
fn test_broken_metadata_is_not_a_list() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let list_class = fx.mock.list_of(fx.mock.primitive(PrimitiveType::I32));
    let list = fx.mock.new_list(list_class, vec![HostValue::I32(1)]);
    fx.mock.break_metadata(list_class);

    let read = Vec::<i32>::read_value(&cx, HostValue::Object(list));
    match read {
        Err(MarshalError::Host(HostError::Exception(e))) => {
            assert_eq!(e.class_name, "System.TypeLoadException")
        }
        other => panic!("expected host exception, got {other:?}"),
    }
    assert_eq!(fx.mock.call_count(list_class, names::GET_COUNT), 0);

    let objects = fx.mock.object_count();
    let write = vec![1, 2].write_value(&cx, Slot::empty(Some(list_class)));
    assert!(matches!(write, Err(MarshalError::Host(HostError::Exception(_)))));
    assert_eq!(fx.mock.object_count(), objects);
}

#[test]
fn test_host_error_propagates() {
    let fx = fixture();
    let cx = MarshalContext::new(&fx.session);
    let handle = ResourceHandle::from_object(ObjectRef::from_raw(0xFFFF_FFFF));

    let result = read_from_host::<GcPlanetData>(&cx, &handle);
    assert!(matches!(
        result,
        Err(MarshalError::Host(HostError::UnknownObject(_)))
    ));
}

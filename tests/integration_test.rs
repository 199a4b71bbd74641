use ndarray::{ArrayD, IxDyn};
use netcdf::{create, open};
use ru_istp::{
    cdf_to_dataset, dataset_summary_json, get_variable_metadata, open_dataset, Attribute,
    CatalogSource, ConversionOptions, DataType, Dataset, DiagnosticKind, MemorySource,
    NetCDFSource, NetCDFWriter, Result, Values, VariableProperties, VariableRecord,
};
use tempfile::tempdir;

const RECORDS: usize = 10;

fn grid(records: usize, width: usize, fill: impl Fn(usize) -> f64) -> Values {
    let values: Vec<f64> = (0..records * width).map(fill).collect();
    Values::Float(ArrayD::from_shape_vec(IxDyn(&[records, width]), values).unwrap())
}

/// A small ISTP-style instrument file: TT2000 time, an energy table with
/// labels, a flux and its uncertainty.
fn istp_source() -> MemorySource {
    let epochs: Vec<i64> = (0..RECORDS as i64).map(|i| i * 1_000_000_000).collect();

    MemorySource::new()
        .with_variable(
            VariableRecord::new(
                "Epoch",
                Values::ints(epochs),
                VariableProperties::record_varying(DataType::TimeTt2000, RECORDS, vec![]),
            )
            .with_text("UNITS", "ns")
            .with_attribute(
                "FILLVAL",
                Attribute::new(DataType::TimeTt2000, Values::ints(vec![i64::MIN])),
            ),
        )
        .with_variable(VariableRecord::new(
            "energy",
            Values::floats(vec![10.0, 100.0, 1000.0]),
            VariableProperties::non_record(DataType::Double, vec![3]),
        ))
        .with_variable(VariableRecord::new(
            "energy_labels",
            Values::texts(vec!["low", "mid", "high"]),
            VariableProperties::non_record(DataType::Char, vec![3]),
        ))
        .with_variable(
            VariableRecord::new(
                "FLUX",
                grid(RECORDS, 3, |i| i as f64),
                VariableProperties::record_varying(DataType::Double, RECORDS, vec![3]),
            )
            .with_text("DEPEND_0", "Epoch")
            .with_text("DEPEND_1", "energy")
            .with_text("LABL_PTR_1", "energy_labels")
            .with_text("DELTA_PLUS_VAR", "FLUX_err")
            .with_text("FIELDNAM", "Flux")
            .with_text("UNITS", "counts")
            .with_attribute("FILLVAL", Attribute::double(-1.0e31)),
        )
        .with_variable(VariableRecord::new(
            "FLUX_err",
            grid(RECORDS, 3, |_| 0.5),
            VariableProperties::record_varying(DataType::Double, RECORDS, vec![3]),
        ))
        .with_global_attribute("Project", Attribute::text("ISTP>International Solar-Terrestrial Physics"))
}

/// Structural comparison that treats NaN fill values as equal.
fn assert_same_structure(a: &Dataset, b: &Dataset) {
    assert_eq!(format!("{:?}", a.coordinates), format!("{:?}", b.coordinates));
    assert_eq!(format!("{:?}", a.data_variables), format!("{:?}", b.data_variables));
    assert_eq!(format!("{:?}", a.attributes), format!("{:?}", b.attributes));
}

#[test]
fn test_every_variable_is_classified_once() -> Result<()> {
    let dataset = cdf_to_dataset(&istp_source(), &ConversionOptions::default())?;

    for name in ["Epoch", "energy", "energy_labels", "FLUX", "FLUX_err"] {
        assert!(
            dataset.is_coordinate(name) ^ dataset.is_data_variable(name),
            "{} must be in exactly one map",
            name
        );
    }
    assert_eq!(dataset.len(), 5);
    Ok(())
}

#[test]
fn test_istp_relationships_are_resolved() -> Result<()> {
    let dataset = cdf_to_dataset(&istp_source(), &ConversionOptions::default())?;

    let flux = &dataset.data_variables["FLUX"];
    assert_eq!(flux.dims, vec!["Epoch".to_string(), "energy".to_string()]);
    assert_eq!(flux.attribute_text("standard_name"), Some("Flux"));
    assert_eq!(flux.attribute_text("units"), Some("counts"));

    assert_eq!(dataset.coordinates["Epoch"].dims, vec!["Epoch".to_string()]);
    assert_eq!(dataset.coordinates["energy"].dims, vec!["energy".to_string()]);

    let labels = &dataset.coordinates["energy_labels"];
    assert_eq!(labels.dims, vec!["energy".to_string()]);

    let err = &dataset.coordinates["FLUX_err"];
    assert_eq!(err.dims, flux.dims);
    assert_eq!(err.shape(), &[RECORDS, 3]);

    assert_eq!(
        dataset.attributes["Project"].as_text(),
        Some("ISTP>International Solar-Terrestrial Physics")
    );
    assert!(dataset.diagnostics.is_empty());
    Ok(())
}

#[test]
fn test_self_referencing_time_becomes_coordinate() -> Result<()> {
    let source = MemorySource::new()
        .with_variable(
            VariableRecord::new(
                "TIME",
                Values::floats((0..10).map(f64::from).collect()),
                VariableProperties::record_varying(DataType::Double, 10, vec![]),
            )
            .with_text("DEPEND_0", "TIME"),
        )
        .with_variable(
            VariableRecord::new(
                "FLUX",
                Values::floats(vec![1.0; 10]),
                VariableProperties::record_varying(DataType::Double, 10, vec![]),
            )
            .with_text("DEPEND_0", "TIME"),
        );

    let dataset = cdf_to_dataset(&source, &ConversionOptions::default())?;
    assert!(dataset.is_coordinate("TIME"));
    assert_eq!(dataset.data_variables["FLUX"].dims[0], "TIME");
    Ok(())
}

#[test]
fn test_conversion_is_idempotent() -> Result<()> {
    let options = ConversionOptions {
        to_unixtime: true,
        ..Default::default()
    };
    let source = istp_source();

    let first = cdf_to_dataset(&source, &options)?;
    let second = cdf_to_dataset(&source, &options)?;
    assert_same_structure(&first, &second);
    assert_eq!(first.diagnostics, second.diagnostics);
    Ok(())
}

#[test]
fn test_both_time_flags_match_unixtime_only() -> Result<()> {
    let both = cdf_to_dataset(
        &istp_source(),
        &ConversionOptions {
            to_datetime: true,
            to_unixtime: true,
            fillval_to_nan: false,
        },
    )?;
    let unix = cdf_to_dataset(
        &istp_source(),
        &ConversionOptions {
            to_unixtime: true,
            ..Default::default()
        },
    )?;

    assert_same_structure(&both, &unix);
    assert!(both.diagnostics.contains(DiagnosticKind::ConflictingTimeConversion));
    assert!(!unix.diagnostics.contains(DiagnosticKind::ConflictingTimeConversion));

    let epoch = &unix.coordinates["Epoch"];
    assert_eq!(epoch.attribute_text("UNITS"), Some("seconds"));
    match &epoch.data {
        Values::Float(seconds) => assert!((seconds[[0]] - 946_727_935.816).abs() < 1e-6),
        other => panic!("expected unix seconds, got {}", other.kind_name()),
    }
    Ok(())
}

#[test]
fn test_calendar_conversion() -> Result<()> {
    let dataset = cdf_to_dataset(
        &istp_source(),
        &ConversionOptions {
            to_datetime: true,
            ..Default::default()
        },
    )?;

    let epoch = &dataset.coordinates["Epoch"];
    assert_eq!(epoch.attribute_text("UNITS"), Some("Datetime (UTC)"));
    assert_eq!(epoch.data.kind_name(), "datetime64");
    Ok(())
}

#[test]
fn test_fill_round_trip() -> Result<()> {
    let source = MemorySource::new().with_variable(
        VariableRecord::new(
            "bad",
            Values::floats(vec![-1.0e31; 4]),
            VariableProperties::record_varying(DataType::Float, 4, vec![]),
        )
        .with_attribute("FILLVAL", Attribute::new(DataType::Float, Values::floats(vec![-1.0e31]))),
    );

    let filled = cdf_to_dataset(
        &source,
        &ConversionOptions {
            fillval_to_nan: true,
            ..Default::default()
        },
    )?;
    match &filled.data_variables["bad"].data {
        Values::Float(values) => assert!(values.iter().all(|v| v.is_nan())),
        other => panic!("expected floats, got {}", other.kind_name()),
    }

    let kept = cdf_to_dataset(&source, &ConversionOptions::default())?;
    assert_eq!(kept.data_variables["bad"].data, Values::floats(vec![-1.0e31; 4]));
    Ok(())
}

#[test]
fn test_uncertainty_with_different_record_count_stays_data() -> Result<()> {
    let source = MemorySource::new()
        .with_variable(
            VariableRecord::new(
                "FLUX",
                Values::floats(vec![1.0; 4]),
                VariableProperties::record_varying(DataType::Double, 4, vec![]),
            )
            .with_text("DELTA_PLUS_VAR", "err"),
        )
        .with_variable(VariableRecord::new(
            "err",
            Values::floats(vec![0.1; 6]),
            VariableProperties::record_varying(DataType::Double, 6, vec![]),
        ));

    let dataset = cdf_to_dataset(&source, &ConversionOptions::default())?;
    assert!(dataset.is_data_variable("err"));
    assert_eq!(dataset.data_variables["err"].dims, vec!["unlimited1".to_string()]);
    assert_eq!(dataset.data_variables["FLUX"].dims, vec!["unlimited0".to_string()]);
    Ok(())
}

#[test]
fn test_unwritten_variable_is_empty() -> Result<()> {
    // Records were never written, so the stored values must not be read
    let source = MemorySource::new().with_variable(VariableRecord::new(
        "empty",
        Values::floats(vec![1.0, 2.0, 3.0]),
        VariableProperties::record_varying(DataType::Double, 0, vec![]),
    ));

    let dataset = cdf_to_dataset(&source, &ConversionOptions::default())?;
    let empty = &dataset.data_variables["empty"];
    assert!(empty.data.is_empty());
    assert_eq!(empty.shape(), &[0]);
    assert_eq!(empty.dims, vec!["unlimited0".to_string()]);
    Ok(())
}

#[test]
fn test_missing_global_attributes_are_tolerated() -> Result<()> {
    let source = istp_source().without_global_attributes();
    let dataset = cdf_to_dataset(&source, &ConversionOptions::default())?;
    assert!(dataset.attributes.is_empty());
    assert_eq!(dataset.len(), 5);
    Ok(())
}

#[test]
fn test_variable_metadata_and_summary() -> Result<()> {
    let dataset = cdf_to_dataset(&istp_source(), &ConversionOptions::default())?;

    let metadata = get_variable_metadata(&dataset, "FLUX")?;
    assert_eq!(metadata.role.as_str(), "data");
    assert_eq!(metadata.total_elements, RECORDS * 3);
    assert_eq!(metadata.dimensions[0].name, "Epoch");
    assert_eq!(metadata.dimensions[1].length, 3);

    assert!(get_variable_metadata(&dataset, "nope").is_err());

    let summary = dataset_summary_json(&dataset);
    assert_eq!(summary["dims"]["Epoch"], RECORDS);
    assert_eq!(summary["coords"]["energy"]["dims"][0], "energy");
    assert_eq!(summary["data_vars"]["FLUX"]["attrs"]["units"], "counts");
    Ok(())
}

#[test]
fn test_netcdf_round_trip() -> Result<()> {
    let temp_dir = tempdir()?;
    let input_path = temp_dir.path().join("istp_input.nc");
    let output_path = temp_dir.path().join("istp_output.nc");

    let epoch_offset = 62_167_219_200_000.0;
    {
        let mut file = create(&input_path)?;
        file.add_unlimited_dimension("Epoch")?;
        file.add_dimension("energy", 3)?;
        file.add_attribute("Project", "ISTP>International Solar-Terrestrial Physics")?;

        {
            let mut epoch = file.add_variable::<f64>("Epoch", &["Epoch"])?;
            epoch.put_attribute("CDF_DATA_TYPE", "CDF_EPOCH")?;
            epoch.put_attribute("UNITS", "ms")?;
            for record in 0..4usize {
                epoch.put_value(epoch_offset + 1000.0 * record as f64, [record])?;
            }
        }
        {
            let mut energy = file.add_variable::<f64>("energy", &["energy"])?;
            let energies = vec![10.0, 100.0, 1000.0];
            energy.put_values(&energies, ..)?;
        }
        {
            let mut flux = file.add_variable::<f64>("flux", &["Epoch", "energy"])?;
            flux.put_attribute("DEPEND_0", "Epoch")?;
            flux.put_attribute("DEPEND_1", "energy")?;
            flux.put_attribute("FILLVAL", -1.0e31)?;
            flux.put_attribute("UNITS", "counts")?;
            for record in 0..4usize {
                let row = if record == 2 {
                    vec![1.0, -1.0e31, 3.0]
                } else {
                    vec![1.0, 2.0, 3.0]
                };
                flux.put_values(&row, (record, ..))?;
            }
        }
    }

    let options = ConversionOptions {
        to_unixtime: true,
        fillval_to_nan: true,
        ..Default::default()
    };
    let dataset = open_dataset(&input_path, &options)?;

    let epoch = &dataset.coordinates["Epoch"];
    assert_eq!(epoch.data, Values::floats(vec![0.0, 1.0, 2.0, 3.0]));
    assert_eq!(epoch.attribute_text("UNITS"), Some("seconds"));
    assert!(dataset.is_coordinate("energy"));

    let flux = &dataset.data_variables["flux"];
    assert_eq!(flux.dims, vec!["Epoch".to_string(), "energy".to_string()]);
    match &flux.data {
        Values::Float(values) => {
            assert!(values[[2, 1]].is_nan());
            assert_eq!(values[[3, 2]], 3.0);
        }
        other => panic!("expected floats, got {}", other.kind_name()),
    }

    let skipped = NetCDFWriter::new(&output_path).write_dataset(&dataset)?;
    assert!(skipped.is_empty());

    let exported = open(&output_path)?;
    let flux_out = exported.variable("flux").expect("flux is exported");
    let dims: Vec<String> = flux_out
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(dims, vec!["Epoch".to_string(), "energy".to_string()]);
    let values: Vec<f64> = flux_out.get_values::<f64, _>(..)?;
    assert_eq!(values.len(), 12);
    assert!(values[7].is_nan());
    assert!(flux_out.attribute("units").is_some());
    assert!(exported.attribute("history").is_some());
    assert!(exported.variable("Epoch").expect("Epoch is exported").attribute("CDF_DATA_TYPE").is_none());
    Ok(())
}

#[test]
fn test_netcdf_storage_types_map_to_cdf_types() -> Result<()> {
    let temp_dir = tempdir()?;
    let input_path = temp_dir.path().join("storage_types.nc");
    {
        let mut file = create(&input_path)?;
        file.add_dimension("x", 3)?;
        file.add_variable::<i16>("counts", &["x"])?.put_values(&[1i16, 2, 3], ..)?;
        file.add_variable::<u8>("flags", &["x"])?.put_values(&[0u8, 1, 0], ..)?;
        file.add_variable::<f32>("level", &["x"])?.put_values(&[0.5f32, 1.5, 2.5], ..)?;
        file.add_variable::<i64>("ticks", &["x"])?.put_values(&[7i64, 8, 9], ..)?;
    }

    let source = NetCDFSource::open(&input_path)?;
    assert_eq!(source.get_variable_properties("counts")?.data_type, DataType::Int2);
    assert_eq!(source.get_variable_properties("flags")?.data_type, DataType::UInt1);
    assert_eq!(source.get_variable_properties("level")?.data_type, DataType::Float);
    assert_eq!(source.get_variable_properties("ticks")?.data_type, DataType::Int8);
    assert_eq!(source.get_variable_data("counts")?, Values::ints(vec![1, 2, 3]));
    Ok(())
}

#[test]
fn test_export_skips_text_variables() -> Result<()> {
    let temp_dir = tempdir()?;
    let output_path = temp_dir.path().join("labels.nc");

    let source = MemorySource::new().with_variable(VariableRecord::new(
        "names",
        Values::texts(vec!["a", "b"]),
        VariableProperties::non_record(DataType::Char, vec![2]),
    ));
    let dataset = cdf_to_dataset(&source, &ConversionOptions::default())?;

    let skipped = NetCDFWriter::new(&output_path).write_dataset(&dataset)?;
    assert!(skipped.contains(DiagnosticKind::ExportSkipped));
    assert!(open(&output_path)?.variable("names").is_none());
    Ok(())
}

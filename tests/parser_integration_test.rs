use ctd_relay::bottom_do::{write_bottom_do, BottomExport};
use ctd_relay::filename::CtdFileName;
use ctd_relay::kkyy;
use ctd_relay::parser::{BoundingBox, CtdFile};

const HEADER: &[&str] = &[
    "* Sea-Bird SBE 9 Data File:",
    "* System UpLoad Time = May 08 2013 18:35:13",
    "* NMEA Latitude = 27 59.54 N",
    "* NMEA Longitude = 092 59.95 W",
    "** Ship: R/V Test",
    "** Cruise: 1305",
    "** Station: B12",
    "** Cast: 004",
    "** Depth: 35",
    "# nquan = 4",
    "# nvalues = 2",
    "# name 0 = depSM: Depth [salt water, m]",
    "# name 1 = t090C: Temperature [ITS-90, deg C]",
    "# name 2 = sal00: Salinity, Practical [PSU]",
    "# name 3 = sbeox0Mg/L: Oxygen, SBE 43 [mg/l]",
];

const DATA: &str = "\
*END*
      12.700    18.345    35.670     6.100
      33.500    17.100
";

fn cast_file(skip: Option<usize>) -> String {
    let mut content = String::new();
    for (index, line) in HEADER.iter().enumerate() {
        if Some(index) == skip {
            continue;
        }
        content.push_str(line);
        content.push('\n');
    }
    content.push_str(DATA);
    content
}

/// A cast with one good line and one missing its salinity column
#[test]
fn test_convert_complete_flow() {
    let ctd = CtdFile::parse(cast_file(None), BoundingBox::default());
    assert!(ctd.is_complete());

    let metadata = ctd.metadata();
    assert_eq!(metadata.date.as_deref(), Some("08053"));
    assert_eq!(metadata.time.as_deref(), Some("1835"));
    assert_eq!(metadata.latitude.as_ref().unwrap().encoded, "27992");
    assert_eq!(metadata.longitude.as_ref().unwrap().encoded, "092999");

    let mut encoded = ctd.encoded_samples().unwrap();
    let groups: Vec<String> = encoded.by_ref().map(|g| g.to_string()).collect();
    assert_eq!(groups, vec!["20012 31835 43567"]);

    let stats = encoded.stats();
    assert_eq!(stats.lines, 2);
    assert_eq!(stats.encoded, 1);
    assert_eq!(stats.missing_columns, 1);
    assert_eq!(stats.column_mismatches, 1);
    assert_eq!(stats.skipped(), 1);

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("WTEC_201305081835_004_out.txt");
    let message = kkyy::convert_file(&ctd, "WTEC", &output).unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, message.to_string());
    assert_eq!(
        written,
        "KKYY 08053 1835/ 727992 092999 88872 83099\n\
         20012 31835 43567\n\
         99999 WTEC\n"
    );
}

#[test]
fn test_samples_can_be_walked_twice() {
    let ctd = CtdFile::parse(cast_file(None), BoundingBox::default());

    let first: Vec<_> = ctd.samples().unwrap().collect();
    let second: Vec<_> = ctd.samples().unwrap().collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].oxygen, Some(6.1));
}

#[test]
fn test_bottom_do_uses_last_decoded_sample() {
    let ctd = CtdFile::parse(cast_file(None), BoundingBox::default());
    let file = CtdFileName::parse("WTEC_201305081835_004.cnv").unwrap();
    let dir = tempfile::tempdir().unwrap();

    let export = write_bottom_do(&ctd, &file, dir.path()).unwrap();
    let BottomExport::Written { path, sample } = export else {
        panic!("expected an oxygen record");
    };
    assert_eq!(sample.depth, 12.7);

    let written = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        "R/V Test,1305,08MAY2013,18:35:13,B12,004,-92.999167,27.992333,35,12.7,6.1"
    );
}

/// Each mandatory header line, removed on its own, makes the file incomplete
#[test]
fn test_single_field_omissions() {
    let mandatory = [
        (1, "datetime"),
        (2, "latitude"),
        (3, "longitude"),
        (9, "data value count"),
        (10, "data line count"),
        (11, "depth index"),
        (12, "temperature index"),
        (13, "salinity index"),
    ];

    for (index, field) in mandatory {
        let ctd = CtdFile::parse(cast_file(Some(index)), BoundingBox::default());
        assert!(!ctd.is_complete(), "complete without line {}", index);
        assert_eq!(ctd.metadata().missing_fields(), vec![field]);

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        assert!(kkyy::convert_file(&ctd, "WTEC", &output).is_err());
        assert!(!output.exists());
    }
}

#[test]
fn test_position_outside_bounding_box() {
    let gulf = BoundingBox::from([-98.0, 18.0, -80.0, 31.0]);
    let ctd = CtdFile::parse(cast_file(None), gulf);
    assert!(ctd.is_complete());

    let atlantic = BoundingBox::from([-80.0, 30.0, -60.0, 45.0]);
    let ctd = CtdFile::parse(cast_file(None), atlantic);
    assert!(ctd.metadata().latitude.is_none());
    assert!(ctd.metadata().longitude.is_none());
    assert!(!ctd.is_complete());
}

#[test]
fn test_missing_end_marker_has_no_samples() {
    let content = cast_file(None).replace("*END*\n", "");
    let ctd = CtdFile::parse(content, BoundingBox::default());

    assert_eq!(ctd.samples().unwrap().count(), 0);

    let dir = tempfile::tempdir().unwrap();
    let result = kkyy::convert_file(&ctd, "WTEC", &dir.path().join("out.txt"));
    assert!(result.is_err());
}

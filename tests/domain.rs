use assert_matches::assert_matches;

use sentinel_fetch::domain::{ProcessingLevel, ProductId, parse_tile_coordinates};
use sentinel_fetch::error::FetchError;
use sentinel_fetch::location::StoreLocation;

#[test]
fn parse_reference_identifier() {
    let coords =
        parse_tile_coordinates("S2A_MSIL1C_20200101T000000_N0209_R000_T56HKH_20200101T000000")
            .unwrap();
    assert_eq!(coords.grid_square, "56");
    assert_eq!(coords.latitude_band, "H");
    assert_eq!(coords.path_number, "KH");
}

#[test]
fn parse_rejects_identifier_without_underscores() {
    let err = parse_tile_coordinates("S2AMSIL1C").unwrap_err();
    assert_matches!(err, FetchError::InvalidIdentifierFormat(_));
}

#[test]
fn product_id_rejects_other_missions() {
    let err = "LC08_L1TP_001002_20200101".parse::<ProductId>().unwrap_err();
    assert_matches!(err, FetchError::InvalidProductId(_));
}

#[test]
fn l2a_location_uses_l2_bucket() {
    let id: ProductId = "S2B_MSIL2A_20210101T000000_N0214_R000_T50HMK_20210101T000000"
        .parse()
        .unwrap();
    let level = id.processing_level().unwrap();
    assert_eq!(level, ProcessingLevel::L2A);

    let location = StoreLocation::build(
        level.default_base_url(),
        &id,
        &id.tile_coordinates().unwrap(),
    );
    assert_eq!(
        location.file_url(level.manifest_name()),
        "https://storage.googleapis.com/gcp-public-data-sentinel-2/L2/tiles/50/H/MK/\
         S2B_MSIL2A_20210101T000000_N0214_R000_T50HMK_20210101T000000.SAFE/MTD_MSIL2A.xml"
    );
}

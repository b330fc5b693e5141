#![no_main]

use libfuzzer_sys::fuzz_target;
use ts_map_engine::binary::parse_sector_bytes;
use ts_map_engine::core::SectorFileKind;

fuzz_target!(|data: &[u8]| {
    // Erstes Byte waehlt die Dateiart, der Rest ist der Dateiinhalt
    let Some((selector, bytes)) = data.split_first() else {
        return;
    };
    let kind = SectorFileKind::ALL[*selector as usize % SectorFileKind::ALL.len()];
    let _ = parse_sector_bytes(kind, bytes);
});

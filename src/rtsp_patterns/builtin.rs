//! Built-in stream path templates

use super::PatternEntry;

const HIKVISION: &[(&str, Option<&str>)] = &[
    ("/Streaming/Channels/101", Some("/Streaming/Channels/102")),
    ("/ISAPI/Streaming/channels/101", Some("/ISAPI/Streaming/channels/102")),
    ("/h264/ch1/main/av_stream", Some("/h264/ch1/sub/av_stream")),
    ("/live/channel0", Some("/live/channel1")),
    ("/media/video1", Some("/media/video2")),
    ("/stream1", Some("/stream2")),
];

const DAHUA: &[(&str, Option<&str>)] = &[
    ("/cam/realmonitor?channel=1&subtype=0", Some("/cam/realmonitor?channel=1&subtype=1")),
    ("/live/main", Some("/live/sub")),
    ("/live/ch1", Some("/live/ch2")),
];

const GODREJ: &[(&str, Option<&str>)] = &[
    ("/cam/realmonitor?channel=1&subtype=0", Some("/cam/realmonitor?channel=1&subtype=1")),
    ("/Streaming/Channels/101", Some("/Streaming/Channels/102")),
    ("/live/main", Some("/live/sub")),
];

const UNIVIEW: &[(&str, Option<&str>)] = &[
    ("/media/video1", Some("/media/video2")),
    ("/unicast/c1/s0/live", Some("/unicast/c1/s1/live")),
];

const TIANDY: &[(&str, Option<&str>)] = &[
    ("/1/1", Some("/1/2")),
    ("/stream1", Some("/stream2")),
];

const TVT: &[(&str, Option<&str>)] = &[
    ("/profile1", Some("/profile2")),
    ("/chID=1&streamType=main", Some("/chID=1&streamType=sub")),
];

const AXIS: &[(&str, Option<&str>)] = &[
    ("/axis-media/media.amp", Some("/axis-media/media.amp?resolution=640x480")),
    ("/axis-media/media.amp?videocodec=h264", None),
];

const GENERIC: &[(&str, Option<&str>)] = &[
    ("/live/main", Some("/live/sub")),
    ("/stream1", Some("/stream2")),
    ("/live/channel0", Some("/live/channel1")),
    ("/0", Some("/1")),
];

fn entries(table: &[(&str, Option<&str>)]) -> Vec<PatternEntry> {
    table
        .iter()
        .map(|(main, sub)| PatternEntry::new(*main, *sub))
        .collect()
}

/// (vendor key, templates) for every built-in family
pub fn builtin_patterns() -> Vec<(&'static str, Vec<PatternEntry>)> {
    vec![
        ("Hikvision", entries(HIKVISION)),
        ("Prama", entries(HIKVISION)),
        ("Dahua", entries(DAHUA)),
        ("CP Plus", entries(DAHUA)),
        ("Amcrest", entries(DAHUA)),
        ("Godrej", entries(GODREJ)),
        ("Uniview", entries(UNIVIEW)),
        ("Tiandy", entries(TIANDY)),
        ("TVT", entries(TVT)),
        ("Axis", entries(AXIS)),
        (crate::camera_brand::GENERIC, entries(GENERIC)),
    ]
}

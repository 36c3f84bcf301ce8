//! Minimal SDP reading for DESCRIBE replies

/// Video metadata found in an SDP body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdpInfo {
    pub codec: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<f32>,
    pub bitrate_kbps: Option<u32>,
}

fn dims(w: &str, h: &str) -> Option<String> {
    let (w, h) = (w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?);
    (w > 0 && h > 0).then(|| format!("{}x{}", w, h))
}

/// Read codec / resolution / fps / bitrate from the first video section
/// (or the whole body when it has no `m=video` line).
pub fn parse_sdp(body: &str) -> SdpInfo {
    let has_video = body.lines().any(|l| l.trim_start().starts_with("m=video"));
    let mut info = SdpInfo::default();
    let mut in_video = !has_video;
    let mut payload: Option<String> = None;

    for line in body.lines().map(str::trim) {
        if let Some(m) = line.strip_prefix("m=") {
            if in_video && has_video && payload.is_some() {
                break;
            }
            in_video = m.starts_with("video");
            if in_video {
                payload = m.split_whitespace().nth(3).map(str::to_string);
            }
            continue;
        }
        if !in_video {
            continue;
        }

        if let Some(rest) = line.strip_prefix("a=rtpmap:") {
            let mut parts = rest.splitn(2, ' ');
            let pt = parts.next().unwrap_or_default();
            let enc = parts.next().unwrap_or_default();
            let matches_pt = payload.as_deref().map_or(true, |p| p == pt);
            if info.codec.is_none() && matches_pt {
                info.codec = enc.split('/').next().map(|c| c.trim().to_uppercase());
            }
        } else if let Some(rest) = line.strip_prefix("a=framerate:") {
            info.fps = rest.trim().parse().ok();
        } else if let Some(rest) = line.strip_prefix("a=x-dimensions:") {
            if let Some((w, h)) = rest.split_once(',') {
                info.resolution = info.resolution.take().or_else(|| dims(w, h));
            }
        } else if let Some(rest) = line.strip_prefix("a=framesize:") {
            // a=framesize:<pt> <w>-<h>
            if let Some((w, h)) = rest.split_whitespace().nth(1).and_then(|s| s.split_once('-')) {
                info.resolution = info.resolution.take().or_else(|| dims(w, h));
            }
        } else if let Some(rest) = line.strip_prefix("a=cliprect:") {
            // top,left,bottom,right
            let v: Vec<&str> = rest.split(',').collect();
            if v.len() == 4 {
                info.resolution = info.resolution.take().or_else(|| dims(v[3], v[2]));
            }
        } else if let Some(rest) = line.strip_prefix("b=AS:") {
            info.bitrate_kbps = info.bitrate_kbps.or_else(|| rest.trim().parse().ok());
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hikvision_style_sdp() {
        let sdp = "v=0\r\n\
o=- 1109162014219182 0 IN IP4 0.0.0.0\r\n\
s=Media Presentation\r\n\
m=video 0 RTP/AVP 96\r\n\
b=AS:4096\r\n\
a=rtpmap:96 H264/90000\r\n\
a=framerate:25.000000\r\n\
a=x-dimensions:1920,1080\r\n\
m=audio 0 RTP/AVP 0\r\n\
a=rtpmap:0 PCMU/8000\r\n";
        let info = parse_sdp(sdp);
        assert_eq!(info.codec.as_deref(), Some("H264"));
        assert_eq!(info.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(info.fps, Some(25.0));
        assert_eq!(info.bitrate_kbps, Some(4096));
    }

    #[test]
    fn test_parse_framesize_and_cliprect() {
        let sdp = "m=video 0 RTP/AVP 97\na=rtpmap:97 H265/90000\na=framesize:97 2560-1440\n";
        let info = parse_sdp(sdp);
        assert_eq!(info.codec.as_deref(), Some("H265"));
        assert_eq!(info.resolution.as_deref(), Some("2560x1440"));

        let sdp = "m=video 0 RTP/AVP 96\na=rtpmap:96 H264/90000\na=cliprect:0,0,720,1280\n";
        assert_eq!(parse_sdp(sdp).resolution.as_deref(), Some("1280x720"));
    }

    #[test]
    fn test_audio_only_and_empty() {
        let info = parse_sdp("");
        assert_eq!(info, SdpInfo::default());

        // Audio-only description reports no video codec
        let info = parse_sdp("m=audio 0 RTP/AVP 8\na=rtpmap:8 PCMA/8000\n");
        assert!(info.codec.is_none());
    }
}

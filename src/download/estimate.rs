use crate::download::error::DownloadError;
use crate::download::platform::RawEncoding;

/// Estimates the byte size of one rendition.
///
/// A declared content length wins. Otherwise the size is derived from the
/// bitrate (average if positive, nominal otherwise) and the duration:
/// `bytes = bitrate / 8 * duration_seconds`.
///
/// # Errors
/// `DownloadError::Estimation` when the duration is missing or not a number,
/// or when there is no usable bitrate. Callers treat that as "size unknown".
pub fn estimate_size(raw: &RawEncoding) -> Result<u64, DownloadError> {
    if let Some(len) = raw.content_length.filter(|len| *len > 0) {
        return Ok(len);
    }

    let duration_ms = raw
        .approx_duration_ms
        .as_deref()
        .ok_or_else(|| DownloadError::Estimation(format!("itag {}: no duration", raw.tag)))?;
    let duration_ms: f64 = duration_ms
        .trim()
        .parse()
        .map_err(|_| DownloadError::Estimation(format!("itag {}: bad duration {:?}", raw.tag, duration_ms)))?;
    if !duration_ms.is_finite() || duration_ms < 0.0 {
        return Err(DownloadError::Estimation(format!(
            "itag {}: bad duration {}",
            raw.tag, duration_ms
        )));
    }

    let bitrate = raw.effective_bitrate();
    if bitrate == 0 {
        return Err(DownloadError::Estimation(format!("itag {}: no bitrate", raw.tag)));
    }

    let seconds = duration_ms / 1000.0;
    Ok((bitrate as f64 / 8.0 * seconds).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(content_length: Option<u64>, bitrate: u64, avg: Option<u64>, duration: Option<&str>) -> RawEncoding {
        RawEncoding {
            tag: 18,
            mime_type: "video/mp4".into(),
            bitrate,
            average_bitrate: avg,
            approx_duration_ms: duration.map(str::to_string),
            content_length,
            ..Default::default()
        }
    }

    #[test]
    fn declared_length_wins() {
        let r = raw(Some(12_345), 1_000_000, None, Some("not a number"));
        assert_eq!(estimate_size(&r).unwrap(), 12_345);
    }

    #[test]
    fn derives_from_average_bitrate() {
        // 128 kbit/s for 10 s
        let r = raw(None, 256_000, Some(128_000), Some("10000"));
        assert_eq!(estimate_size(&r).unwrap(), 160_000);
    }

    #[test]
    fn falls_back_to_nominal_bitrate() {
        let r = raw(Some(0), 800_000, Some(0), Some("2500.5"));
        assert_eq!(estimate_size(&r).unwrap(), 250_050);
    }

    #[test]
    fn fails_without_duration() {
        let missing = raw(None, 800_000, None, None);
        let garbage = raw(None, 800_000, None, Some("abc"));
        assert!(matches!(estimate_size(&missing), Err(DownloadError::Estimation(_))));
        assert!(matches!(estimate_size(&garbage), Err(DownloadError::Estimation(_))));
    }

    #[test]
    fn fails_without_bitrate() {
        let r = raw(None, 0, None, Some("1000"));
        assert!(matches!(estimate_size(&r), Err(DownloadError::Estimation(_))));
    }
}

/// Looks for a Portuguese audio track in the format listing.
///
/// The listing comes from the extraction tool's `-F` output: the format
/// id is the first token of the line. Accepts both `[pt]` and regional
/// variants such as `[pt-BR]`.
pub fn find_portuguese_audio_track(listing: &str) -> Option<String> {
    listing
        .lines()
        .filter(|line| line.contains("audio only"))
        .find(|line| line.contains("[pt]") || line.contains("[pt-BR]") || line.contains("[pt-PT]"))
        .and_then(first_token)
}

/// Picks the video track: 1080p when present, otherwise the first
/// video-only track available.
pub fn find_best_video_track(listing: &str) -> Option<String> {
    let video_lines: Vec<&str> = listing
        .lines()
        .filter(|line| line.contains("video only"))
        .collect();
    video_lines
        .iter()
        .find(|line| line.contains("1080"))
        .or_else(|| video_lines.first())
        .and_then(|line| first_token(line))
}

fn first_token(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_string)
}

use conflux_error::{ConfluxResult, conflux_bail};

use crate::Fragment;

/// Returns the segment owning the fragment at `position`.
///
/// The owner is `(position + gp_session_id mod total_segments + gp_command_count) mod
/// total_segments`. The shift is the same on every segment of a query and moves small fragment
/// lists away from always landing on the lowest numbered segments.
pub fn segment_for_position(
    position: usize,
    total_segments: u32,
    gp_session_id: i64,
    gp_command_count: i64,
) -> u32 {
    let total = i128::from(total_segments.max(1));
    let shift = i128::from(gp_session_id).rem_euclid(total) + i128::from(gp_command_count);
    let position = i128::try_from(position).unwrap_or(i128::MAX);
    let owner = (position + shift).rem_euclid(total);
    // owner < total_segments
    u32::try_from(owner).unwrap_or_default()
}

/// Selects the fragments owned by `segment_id`.
///
/// Applying this to every segment in `0..total_segments` partitions `fragments`: each fragment is
/// returned to exactly one segment, in list order.
pub fn distribute(
    fragments: &[Fragment],
    segment_id: u32,
    total_segments: u32,
    gp_session_id: i64,
    gp_command_count: i64,
) -> ConfluxResult<Vec<Fragment>> {
    if total_segments == 0 {
        conflux_bail!("total segments must be positive");
    }
    if segment_id >= total_segments {
        conflux_bail!(
            "segment id {} is out of range for {} segments",
            segment_id,
            total_segments
        );
    }

    Ok(fragments
        .iter()
        .enumerate()
        .filter(|(position, _)| {
            segment_for_position(*position, total_segments, gp_session_id, gp_command_count)
                == segment_id
        })
        .map(|(_, fragment)| fragment.clone())
        .collect())
}

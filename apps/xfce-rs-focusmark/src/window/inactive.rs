use crate::core::backend::WindowHandle;

/// Every client window except the active one, in directory order.
///
/// The active window appears at most once in the client list, so at most one
/// entry is removed. An active window missing from the list (closed between
/// the two reads) removes nothing.
pub fn compute_inactive(all: &[WindowHandle], active: Option<WindowHandle>) -> Vec<WindowHandle> {
    let mut inactive = all.to_vec();
    if let Some(active) = active {
        if let Some(pos) = inactive.iter().position(|&w| w == active) {
            inactive.remove(pos);
        }
    }
    inactive
}

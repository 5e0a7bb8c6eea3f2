// ── Kioo Core ─────────────────────────────────────────────────────────────
// Multi-signal inference core for a voice-first mental-health support
// platform: dissonance detection, baseline tracking, cultural deflection
// analysis, and overnight interface configuration.
//
// Module layout mirrors the teacher's `atoms -> engine -> app` layering:
// `atoms` holds pure types/constants/errors with no dependencies on the
// rest of the crate; everything else depends downward, never sideways
// into a peer it doesn't need (`store` is the shared seam that breaks the
// would-be Baseline/Dissonance/Cultural cycle — see DESIGN.md).

pub mod atoms;
pub mod baseline;
pub mod config;
pub mod cultural;
pub mod dissonance;
pub mod overnight;
pub mod records;
pub mod sentiment;
pub mod store;

pub use atoms::error::{CoreError, CoreResult};

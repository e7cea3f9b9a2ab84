//! Test harness for the depsolve resolver: an in-memory source bridge fed by
//! a declarative fixture registry, plus assertion helpers shared by the
//! scenario and property tests.

pub mod helpers;

use depsolve::core::resolver::{self, NullTrace, SolveError, SolveParameters};
use depsolve::core::Lock;
use depsolve::util::CancelToken;

use crate::helpers::FixtureBridge;

/// Runs a solve against a fixture bridge with a null trace and no
/// cancellation, the way nearly every test wants it.
pub fn resolve(params: &SolveParameters, bridge: &FixtureBridge) -> Result<Lock, SolveError> {
    let mut trace = NullTrace;
    resolver::resolve(params, bridge, &mut trace, &CancelToken::new())
}

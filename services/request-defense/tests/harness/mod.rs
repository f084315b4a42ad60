// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for request defense attack simulation.
//!
//! Attacks run against a simulated clock: request `i` arrives at
//! `start + i / requests_per_second`, so results do not depend on how fast
//! the test machine is.

pub mod attacks;
pub mod generators;
pub mod metrics;

// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! Flows that provision, register and anchor patient identities

mod anchoring;
mod classifier;
mod context;
mod onboarding;
mod registration;

pub use anchoring::{
    AnchorReceipt,
    AnchoringCoordinator,
    AnchoringError,
    Artifact,
};
pub use classifier::{
    ClassificationRule,
    ErrorClassifier,
    ErrorKind,
    Matcher,
};
pub use context::{
    FlowStage,
    RequestContext,
};
pub use onboarding::{
    OnboardingCoordinator,
    OnboardingError,
    OnboardingOutcome,
    ProfileWrite,
};
pub use registration::{
    RegistrationCoordinator,
    RegistrationError,
    RegistrationOutcome,
};

// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Magyar Üzemanyagárak.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::time::Duration;

use thiserror::Error;

/// Why a refresh produced no report
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API returned status {0}")]
    Status(u16),

    #[error("Response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unexpected data format: expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("API rejected the request (errorCode: {})", error_code_display(.0.as_ref()))]
    Rejected(Option<serde_json::Value>),

    #[error("Refresh cancelled")]
    Cancelled,
}

fn error_code_display(code: Option<&serde_json::Value>) -> String {
    code.map_or_else(|| "missing".to_owned(), ToString::to_string)
}

impl FetchError {
    /// Short machine-friendly label, used in logs and state snapshots
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Status(_) => "status",
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnObject(_) => "not_an_object",
            Self::Rejected(_) => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Coercion failure for one price field of a fuel entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("field `{0}` is missing")]
    Missing(&'static str),

    #[error("field `{field}` is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },

    #[error("field `{field}` has unsupported type {type_name}")]
    WrongType {
        field: &'static str,
        type_name: &'static str,
    },
}

/// Errors raised by the integration host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Config entry {0} is already set up")]
    AlreadyLoaded(String),

    #[error("Config entry {0} is not loaded")]
    NotLoaded(String),
}

pub type FetchResult<T> = Result<T, FetchError>;

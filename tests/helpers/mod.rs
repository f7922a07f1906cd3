// ABOUTME: Test helper modules shared across integration test binaries
// ABOUTME: Currently just the axum request helper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

pub mod axum_test;

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use catalog_app::{ItemFields, ItemRecord};
use std::path::PathBuf;

const CATEGORIES: [&str; 8] = [
    "Accessories",
    "Clothing",
    "Electronics",
    "Fitness",
    "Furniture",
    "Garden",
    "Kitchen",
    "Toys",
];

const ADJECTIVES: [&str; 14] = [
    "Bamboo", "Black", "Blue", "Brown", "Compact", "Deluxe", "Galaxy", "Gold", "Green", "Leather",
    "Oak", "Silver", "Vintage", "Wireless",
];

const NOUNS: [&str; 16] = [
    "Watch", "Band", "T-Shirt", "Bracelet", "Purse", "Speaker", "Lamp", "Chair", "Mug", "Kettle",
    "Backpack", "Headphones", "Notebook", "Planter", "Sneakers", "Yoga Mat",
];

const WORDS: [&str; 20] = [
    "durable",
    "handmade",
    "lightweight",
    "everyday",
    "premium",
    "classic",
    "portable",
    "cotton",
    "steel",
    "wooden",
    "waterproof",
    "adjustable",
    "soft",
    "compact",
    "bright",
    "quiet",
    "reusable",
    "modern",
    "travel",
    "gift",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator of plausible product fields for tests and demos.
#[derive(Debug, Clone)]
pub struct ProductFaker {
    rng: DeterministicRng,
}

impl ProductFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn product(&mut self) -> ItemFields {
        let name = format!("{} {}", self.pick(&ADJECTIVES), self.pick(&NOUNS));
        ItemFields {
            name,
            description: self.sentence(3, 7),
            category: self.pick(&CATEGORIES).to_owned(),
            price_cents: self.int_range_i64(1, 500) * 100 + self.int_range_i64(0, 99),
            amount: self.int_range_i64(0, 120),
        }
    }

    pub fn products(&mut self, count: usize) -> Vec<ItemFields> {
        (0..count).map(|_| self.product()).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }

    fn sentence(&mut self, min_words: usize, max_words: usize) -> String {
        let count = min_words + self.rng.int_n(max_words.saturating_sub(min_words) + 1);
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            parts.push(self.pick(&WORDS).to_owned());
        }
        let mut sentence = parts.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("catalog.db");
    Ok((dir, db_path))
}

/// The chair used throughout the state and store tests.
pub fn chair() -> ItemFields {
    ItemFields {
        name: "Chair".to_owned(),
        description: "Wood".to_owned(),
        category: "Furniture".to_owned(),
        price_cents: 1_000,
        amount: 3,
    }
}

pub fn record(id: &str, fields: ItemFields) -> ItemRecord {
    ItemRecord::persisted(id, fields)
}

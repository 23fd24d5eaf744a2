// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! A minimal spider package used as a worked example: it "crawls" a small
//! in-memory page list, resuming from wherever `write_kv("cursor", ..)` left
//! off last run, and exits once the list is exhausted.

use spiderd_core::declare_spider_plugin;
use spiderd_core::spider::{Spider, SpiderContext};
use spiderd_core::store::Row;
use std::collections::BTreeMap;

const PAGES: &[&str] = &["/", "/about", "/products", "/contact"];

#[derive(Default)]
pub struct DemoSpider;

impl Spider for DemoSpider {
    fn run(&mut self, ctx: &dyn SpiderContext) {
        ctx.declare_table("pages", sample_row());

        let mut cursor: usize =
            ctx.read_kv("cursor").and_then(|bytes| String::from_utf8(bytes).ok()).and_then(|s| s.parse().ok()).unwrap_or(0);

        while cursor < PAGES.len() {
            if ctx.stop_requested() {
                tracing::info!(cursor, "stop requested, leaving cursor for the next run");
                return;
            }

            let path = PAGES[cursor];
            tracing::info!(path, "fetched page");
            ctx.emit_row("pages", page_row(cursor, path));

            cursor += 1;
            ctx.write_kv("cursor", cursor.to_string().into_bytes());
        }

        tracing::info!("crawl complete");
    }

    fn unload(&mut self, _ctx: &dyn SpiderContext) {
        tracing::info!("unloading demo spider");
    }
}

fn sample_row() -> Row {
    page_row(0, "/")
}

fn page_row(index: usize, path: &str) -> Row {
    let mut fields = BTreeMap::new();
    fields.insert("index".to_string(), serde_json::json!(index as i64));
    fields.insert("path".to_string(), serde_json::json!(path));
    fields
}

declare_spider_plugin!(DemoSpider);

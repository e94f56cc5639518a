// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Arbor Sandbox
// Drives a small scene graph and a graphics-context thread for a few frames.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use arbor_core::delete::DeleteHandler;
use arbor_core::stats::lifetime_stats;
use arbor_core::{LifetimeConfig, ObjectId, Observer, Ref, RefCounted, Referenced};
use arbor_dispatch::{CompletionOperation, FnOperation, OperationThread, ThreadConfig};

const LIFETIME_CONFIG: &str = r#"{ "ref_count_mode": "atomic", "frames_to_retain": 2 }"#;
const THREAD_CONFIG: &str = r#"{ "name": "graphics-context-0", "cancel_poll_interval_us": 50 }"#;
const FRAMES: u32 = 6;

struct SceneNode {
    referenced: Referenced,
    name: String,
    children: Vec<Ref<SceneNode>>,
}

// SAFETY: the record is a field of `SceneNode`.
unsafe impl RefCounted for SceneNode {
    fn referenced(&self) -> &Referenced {
        &self.referenced
    }
}

impl Drop for SceneNode {
    fn drop(&mut self) {
        log::info!("Freeing node '{}'.", self.name);
    }
}

fn node(name: &str, children: Vec<Ref<SceneNode>>) -> Ref<SceneNode> {
    Ref::new(SceneNode {
        referenced: Referenced::new(),
        name: name.to_owned(),
        children,
    })
}

/// Drops cached draw data when a node goes away.
struct RenderCache;

impl Observer for RenderCache {
    fn object_deleted(&self, id: ObjectId) {
        log::info!("Render cache evicting {}.", id);
    }
}

struct GraphicsContext {
    frames_presented: AtomicU32,
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let Some(deleter) = LifetimeConfig::from_json_str(LIFETIME_CONFIG)?.apply() else {
        bail!("lifetime config did not install a deferred delete handler");
    };

    let context = Arc::new(GraphicsContext {
        frames_presented: AtomicU32::new(0),
    });
    let gc_thread = OperationThread::new(ThreadConfig::from_json_str(THREAD_CONFIG)?);
    let parent: Arc<dyn std::any::Any + Send + Sync> = context.clone();
    gc_thread.set_parent(Some(parent));

    gc_thread.add(Arc::new(FnOperation::repeating("swap-buffers", |ctx| {
        if let Some(gc) = ctx.parent_as::<GraphicsContext>() {
            gc.frames_presented.fetch_add(1, Ordering::Relaxed);
        }
        std::thread::sleep(Duration::from_millis(2));
    })));
    gc_thread.start()?;

    let cache: Arc<dyn Observer> = Arc::new(RenderCache);
    let terrain = node("terrain", vec![node("rock", Vec::new())]);
    let vehicle = node("vehicle", vec![node("wheel", Vec::new())]);
    Ref::add_observer(&vehicle, &cache);
    let picked = Ref::downgrade(&vehicle);
    let mut root = Some(node("root", vec![terrain, vehicle]));

    for frame in 1..=FRAMES {
        deleter.set_frame_number(frame);

        if frame == 2 {
            // Detach the vehicle. It stays reachable until the old root is
            // freed by the deferred handler.
            if let Some(old_root) = root.take() {
                let kept: Vec<_> = old_root
                    .children
                    .iter()
                    .filter(|child| !picked.points_to(child))
                    .cloned()
                    .collect();
                root = Some(node("root", kept));
            }
        }

        let deleter_on_gc = Arc::clone(&deleter);
        let draw = Arc::new(CompletionOperation::new(
            format!("draw-frame-{frame}"),
            move |ctx| {
                log::debug!("Drawing on {:?}.", ctx.thread);
                deleter_on_gc.flush();
            },
        ));
        gc_thread.add(draw.clone());
        if !draw.wait_timeout(Duration::from_secs(1)) {
            bail!("frame {frame} was not drawn in time");
        }

        log::info!(
            "Frame {}: vehicle reachable = {}, pending deletes = {}",
            frame,
            picked.is_valid(),
            deleter.pending_count()
        );
    }

    gc_thread.cancel();
    drop(root);
    deleter.flush_all();

    let stats = lifetime_stats();
    log::info!(
        "Presented {} frames; {} objects created, {} destroyed, {} deferred.",
        context.frames_presented.load(Ordering::Relaxed),
        stats.objects_created,
        stats.objects_destroyed,
        stats.deletes_deferred
    );
    Ok(())
}

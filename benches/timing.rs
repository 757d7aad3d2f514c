use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use zkim_crypto::blob::{BlobStore, InMemoryBlobStore};
use zkim_crypto::envelope::EnvelopeEngine;
use zkim_crypto::kernel::CryptoKernel;
use zkim_crypto::types::FileMetadata;

fn time_it<F: FnMut()>(label: &str, iters: usize, mut f: F) {
    for _ in 0..(iters / 10).max(10) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed / (iters as u32);
    println!("{:<24} total={:?}  per_iter={:?}", label, elapsed, per_iter);
}

fn metadata() -> FileMetadata {
    FileMetadata {
        file_name: "bench.bin".into(),
        user_id: "user-1".into(),
        mime_type: None,
        created_at: 0,
        tags: vec![],
        custom_fields: Default::default(),
        access_control: None,
    }
}

fn main() {
    let kernel = Arc::new(CryptoKernel::default());
    let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let engine = EnvelopeEngine::new(kernel, Some(store));

    let platform_key = [1u8; 32];
    let user_key = [2u8; 32];
    let plaintext = vec![0x42u8; 1024];

    let created = engine
        .create_zkim_file(&plaintext, "platform-1", &platform_key, &user_key, metadata(), 0)
        .unwrap();

    let mut tampered = created.file.clone();
    tampered.chunks[0].encrypted_data[0] ^= 0x01;

    let iters = 2_000;

    time_it("create_zkim_file", iters, || {
        let f = engine
            .create_zkim_file(black_box(&plaintext), "platform-1", &platform_key, &user_key, metadata(), 0)
            .unwrap();
        black_box(f);
    });

    time_it("decrypt_zkim_file_valid", iters, || {
        let pt = engine.decrypt_zkim_file(black_box(&created.file), &user_key).unwrap();
        black_box(pt);
    });

    time_it("decrypt_zkim_file_wrong_key", iters, || {
        let r = engine.decrypt_zkim_file(black_box(&created.file), &[9u8; 32]);
        black_box(r.err());
    });

    time_it("decrypt_zkim_file_tampered", iters, || {
        let r = engine.decrypt_zkim_file(black_box(&tampered), &user_key);
        black_box(r.err());
    });

    println!("\nDone.");
}

use super::*;

#[test]
fn create_is_zero_initialized() {
    let mut store = SurfaceStore::default();
    let id = store.create(3, 2).unwrap();
    let s = store.get(id).unwrap();
    assert_eq!(s.dimensions(), (3, 2));
    assert!(s.data().iter().all(|&b| b == 0));
}

#[test]
fn create_default_uses_fallback_size() {
    let mut store = SurfaceStore::default();
    let id = store.create_default().unwrap();
    assert_eq!(store.dimensions(id), (800, 600));

    store.set_default_size(Canvas {
        width: 16,
        height: 9,
    });
    let id = store.create_default().unwrap();
    assert_eq!(store.dimensions(id), (16, 9));
}

#[test]
fn zero_and_oversized_allocations_fail() {
    let mut store = SurfaceStore::default();
    assert!(matches!(
        store.create(0, 10),
        Err(CanvasError::Allocation(_))
    ));
    assert!(matches!(
        store.create(20_000, 1),
        Err(CanvasError::Allocation(_))
    ));
    assert!(store.is_empty());
}

#[test]
fn release_is_idempotent() {
    let mut store = SurfaceStore::default();
    let id = store.create(4, 4).unwrap();

    assert!(store.release(id));
    assert_eq!(store.dimensions(id), (0, 0));
    assert!(store.get(id).is_none());

    assert!(!store.release(id));
    assert_eq!(store.dimensions(id), (0, 0));
    assert_eq!(store.stats().released_surfaces, 1);
    assert_eq!(store.stats().live_bytes, 0);
}

#[test]
fn handles_are_never_reused() {
    let mut store = SurfaceStore::default();
    let a = store.create(1, 1).unwrap();
    store.release(a);
    let b = store.create(1, 1).unwrap();
    assert_ne!(a, b);
    assert!(!store.is_live(a));
}

#[test]
fn release_all_reports_live_count() {
    let mut store = SurfaceStore::default();
    store.create(2, 2).unwrap();
    store.create(2, 2).unwrap();
    let c = store.create(2, 2).unwrap();
    store.release(c);

    assert_eq!(store.release_all(), 2);
    assert!(store.is_empty());
    assert_eq!(store.stats().live_surfaces, 0);
}

#[test]
fn resize_keeps_top_left_and_updates_bytes() {
    let mut store = SurfaceStore::default();
    let id = store.create(2, 2).unwrap();
    store.get_mut(id).unwrap().put_pixel(0, 0, [9, 9, 9, 255]);
    store.get_mut(id).unwrap().put_pixel(1, 1, [7, 7, 7, 255]);

    store.resize(id, 1, 3).unwrap();
    let s = store.get(id).unwrap();
    assert_eq!(s.dimensions(), (1, 3));
    assert_eq!(s.pixel(0, 0), Some([9, 9, 9, 255]));
    assert_eq!(s.pixel(0, 2), Some([0, 0, 0, 0]));
    assert_eq!(store.stats().live_bytes, 12);
}

#[test]
fn adopt_rejects_released_surface() {
    let mut store = SurfaceStore::default();
    let mut s = Surface::new(2, 2).unwrap();
    s.release();
    assert!(store.adopt(s).is_err());
}

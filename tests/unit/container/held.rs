use super::*;

#[test]
fn owned_values_are_released() {
    let h = Held::Owned(7u32);
    assert!(h.is_owned());
    assert_eq!(*h.get(), 7);
    assert_eq!(h.into_owned(), Some(7));
}

#[test]
fn borrowed_values_are_never_released() {
    let h = Held::Borrowed(7u32);
    assert!(!h.is_owned());
    assert_eq!(*h.get(), 7);
    assert_eq!(h.into_owned(), None);
}

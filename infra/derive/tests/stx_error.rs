use std::borrow::Cow;

#[stx_derive::stx_error]
pub enum SampleError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal fault{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn io_failure() -> Result<(), std::io::Error> {
    Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"))
}

#[test]
fn from_source_converts_with_question_mark() {
    fn inner() -> Result<(), SampleError> {
        io_failure()?;
        Ok(())
    }

    let err = inner().unwrap_err();
    assert!(matches!(err, SampleError::Io { context: None, .. }));
}

#[test]
fn context_is_attached_to_source_results() {
    let err: Result<(), SampleError> = io_failure().context("reading block log");
    let err = err.unwrap_err();
    let SampleError::Io { context, .. } = err else {
        panic!("expected Io variant");
    };
    assert_eq!(context.as_deref(), Some("reading block log"));
}

#[test]
fn context_is_attached_to_own_results() {
    let base: Result<(), SampleError> =
        Err(SampleError::NotFound { message: "block 42".into(), context: None });
    let err = base.context("fetching head").unwrap_err();
    let SampleError::NotFound { context, .. } = err else {
        panic!("expected NotFound variant");
    };
    assert_eq!(context.as_deref(), Some("fetching head"));
}

#[test]
fn internal_variant_accepts_strings() {
    let from_static: SampleError = "boom".into();
    assert!(matches!(from_static, SampleError::Internal { .. }));

    let from_owned: SampleError = String::from("boom").into();
    assert!(matches!(from_owned, SampleError::Internal { .. }));
}

#[test]
fn display_includes_context() {
    let err = SampleError::NotFound { message: "block 42".into(), context: Some("replay".into()) };
    assert_eq!(err.to_string(), "Not found (replay): block 42");
}

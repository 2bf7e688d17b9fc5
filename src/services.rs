pub(crate) mod ocr;
pub(crate) mod queue;
pub(crate) mod scorer;
pub(crate) mod storage;

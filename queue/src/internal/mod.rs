pub(crate) mod wait_list;

pub(crate) use wait_list::{WaitKey, WaitList, WakeHandle};

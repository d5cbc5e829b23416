mod confirmation;
mod helpers;
mod webhook;

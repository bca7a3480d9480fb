use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{ObjectStoreClient, StoreResponse};
use crate::error::FetchError;
use crate::retry::Sleeper;

enum Scripted {
    Response {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Error(String),
}

/// Replays queued responses and records every requested URL. Responses
/// routed to a URL take precedence over the shared queue.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Scripted>>,
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, status: u16, content_type: Option<&str>, body: &[u8]) {
        self.script.lock().unwrap().push_back(Scripted::Response {
            status,
            content_type: content_type.map(str::to_string),
            body: body.to_vec(),
        });
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Error(message.to_string()));
    }

    pub fn route_response(&self, url: &str, content_type: Option<&str>, body: &[u8]) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Scripted::Response {
                status: 200,
                content_type: content_type.map(str::to_string),
                body: body.to_vec(),
            });
    }

    pub fn route_error(&self, url: &str, message: &str) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Scripted::Error(message.to_string()));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ObjectStoreClient for ScriptedClient {
    fn get(&self, url: &str) -> Result<StoreResponse, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let routed = self
            .routes
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());
        let next = routed.or_else(|| self.script.lock().unwrap().pop_front());
        match next {
            Some(Scripted::Response {
                status,
                content_type,
                body,
            }) => Ok(StoreResponse {
                status,
                content_type,
                body: Box::new(Cursor::new(body)),
            }),
            Some(Scripted::Error(message)) => Err(FetchError::Http(message)),
            None => Err(FetchError::Http(format!("no scripted response for {url}"))),
        }
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn manifest_xml(entries: &[&str]) -> String {
    let files = entries
        .iter()
        .map(|entry| format!("<IMAGE_FILE>{entry}</IMAGE_FILE>"))
        .collect::<String>();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Level-1C_User_Product><Product_Organisation><Granule_List><Granule>\
         {files}</Granule></Granule_List></Product_Organisation></Level-1C_User_Product>"
    )
}

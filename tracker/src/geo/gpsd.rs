//! gpsd client.
//!
//! gpsd speaks JSON over TCP: after `?WATCH={"enable":true,"json":true};` it sends one report per
//! line.  We only care about `TPV` (time-position-velocity) reports with a usable fix.
//!
//! See <https://gpsd.gitlab.io/gpsd/gpsd_json.html>
//!

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

use ambutrack_common::Coordinate;

use crate::geo::{FixOptions, PositionSource};
use crate::{GeoError, Outlet, Sink, WatchHandle};

/// Default gpsd address
pub const DEF_GPSD: &str = "127.0.0.1:2947";

const WATCH: &str = "?WATCH={\"enable\":true,\"json\":true};\n";

/// The part of a report we use.
///
#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    /// 0-1: no fix, 2: 2D, 3: 3D
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl Report {
    fn fix(&self, min_mode: u8) -> Option<Coordinate> {
        if self.class != "TPV" || self.mode < min_mode {
            return None;
        }
        Coordinate::new(self.lat?, self.lon?).ok()
    }
}

type Reports = Lines<BufReader<TcpStream>>;

fn unavailable(e: impl ToString) -> GeoError {
    GeoError::Unavailable(e.to_string())
}

#[derive(Clone, Debug)]
pub struct GpsdSource {
    pub address: String,
}

impl Default for GpsdSource {
    fn default() -> Self {
        GpsdSource {
            address: DEF_GPSD.to_owned(),
        }
    }
}

impl GpsdSource {
    pub fn new(address: &str) -> Self {
        GpsdSource {
            address: address.to_owned(),
        }
    }

    #[tracing::instrument(skip(self), fields(address = %self.address))]
    async fn open(&self) -> Result<Reports, GeoError> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| unavailable(format!("gpsd at {}: {e}", self.address)))?;
        stream.write_all(WATCH.as_bytes()).await.map_err(unavailable)?;
        debug!("watching gpsd");
        Ok(BufReader::new(stream).lines())
    }
}

/// Read reports until we get a fix good enough.
///
async fn next_fix(reports: &mut Reports, min_mode: u8) -> Result<Coordinate, GeoError> {
    while let Some(line) = reports.next_line().await.map_err(unavailable)? {
        match serde_json::from_str::<Report>(&line) {
            Ok(report) => {
                if let Some(pos) = report.fix(min_mode) {
                    return Ok(pos);
                }
                trace!("skipping {} report", report.class);
            }
            Err(e) => trace!("not a report ({}): {:?}", e, line),
        }
    }
    Err(unavailable("gpsd closed the connection"))
}

#[inline]
fn min_mode(opts: &FixOptions) -> u8 {
    if opts.high_accuracy {
        3
    } else {
        2
    }
}

impl PositionSource for GpsdSource {
    fn name(&self) -> String {
        String::from("gpsd")
    }

    async fn current_position(&self, opts: &FixOptions) -> Result<Coordinate, GeoError> {
        let mut reports = self.open().await?;
        next_fix(&mut reports, min_mode(opts)).await
    }

    fn watch(
        &self,
        opts: &FixOptions,
        sink: Box<dyn Sink<Coordinate, GeoError>>,
    ) -> WatchHandle {
        let outlet = Outlet::new(&format!("gpsd({})", self.address), sink, None);
        let src = self.clone();
        let min_mode = min_mode(opts);

        let task = tokio::spawn({
            let outlet = outlet.clone();
            async move {
                let mut reports = match src.open().await {
                    Ok(reports) => reports,
                    Err(e) => {
                        outlet.fail(e);
                        return;
                    }
                };
                outlet.subscribed();
                info!("{}: watching", outlet.name());

                loop {
                    match next_fix(&mut reports, min_mode).await {
                        Ok(pos) => {
                            if !outlet.deliver(pos, 0) {
                                break;
                            }
                        }
                        Err(e) => {
                            outlet.fail(e);
                            break;
                        }
                    }
                }
            }
        });
        outlet.subscription(Some(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeedEvent;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const SESSION: &str = r#"{"class":"VERSION","release":"3.25","proto_major":3,"proto_minor":15}
{"class":"DEVICES","devices":[{"class":"DEVICE","path":"/dev/ttyUSB0"}]}
{"class":"TPV","device":"/dev/ttyUSB0","mode":1}
{"class":"TPV","device":"/dev/ttyUSB0","mode":2,"lat":9.0501,"lon":7.4901}
{"class":"SKY","satellites":[]}
{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"lat":9.0502,"lon":7.4902,"alt":476.2}
"#;

    /// Fake gpsd: check the watch command then dump `SESSION`.
    ///
    async fn fake_gpsd() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; WATCH.len()];
            sock.read_exact(&mut buf).await.unwrap();
            assert_eq!(WATCH.as_bytes(), &buf[..]);
            sock.write_all(SESSION.as_bytes()).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_gpsd_3d_fix() {
        let src = GpsdSource::new(&fake_gpsd().await);
        let pos = src.current_position(&FixOptions::default()).await.unwrap();
        assert_eq!(Coordinate::new(9.0502, 7.4902).unwrap(), pos);
    }

    #[tokio::test]
    async fn test_gpsd_2d_fix() {
        let src = GpsdSource::new(&fake_gpsd().await);
        let opts = FixOptions {
            high_accuracy: false,
            ..FixOptions::default()
        };
        let pos = src.current_position(&opts).await.unwrap();
        assert_eq!(Coordinate::new(9.0501, 7.4901).unwrap(), pos);
    }

    #[tokio::test]
    async fn test_gpsd_watch() {
        let src = GpsdSource::new(&fake_gpsd().await);
        let opts = FixOptions {
            high_accuracy: false,
            ..FixOptions::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = src.watch(&opts, Box::new(tx));

        assert!(matches!(rx.recv().await, Some(FeedEvent::Update(_))));
        assert!(matches!(rx.recv().await, Some(FeedEvent::Update(_))));
        // fake gpsd hung up
        assert!(matches!(
            rx.recv().await,
            Some(FeedEvent::Error(GeoError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_gpsd_not_running() {
        // Grab a free port and close it right away
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        let src = GpsdSource::new(&addr);
        let err = src.current_position(&FixOptions::default()).await;
        assert!(matches!(err, Err(GeoError::Unavailable(_))));
    }
}

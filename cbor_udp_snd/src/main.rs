use anyhow::{Context, Result};
use ciborium::Value;
use log::{error, info};
use std::net::UdpSocket;
use std::time::{Duration, Instant};

const BLENDSHAPES: &[&str] = &[
    "eyeBlinkLeft",
    "eyeBlinkRight",
    "jawOpen",
    "mouthClose",
    "mouthSmileLeft",
    "mouthSmileRight",
    "browInnerUp",
    "cheekPuff",
];

/// Builds one `{name, blendshapes, transform}` datagram at time `t` seconds.
fn face_frame(name: &str, t: f32) -> Result<Vec<u8>> {
    let blendshapes = BLENDSHAPES
        .iter()
        .enumerate()
        .map(|(i, shape)| {
            let weight = 0.5 + 0.5 * (t * 2.0 + i as f32).sin();
            (Value::Text(shape.to_string()), Value::Float(weight as f64))
        })
        .collect();

    // Row-major 4x4 identity
    let transform = (0..16)
        .map(|i| Value::Float(if i % 5 == 0 { 1.0 } else { 0.0 }))
        .collect();

    let frame = Value::Map(vec![
        (Value::Text("name".into()), Value::Text(name.to_string())),
        (Value::Text("blendshapes".into()), Value::Map(blendshapes)),
        (Value::Text("transform".into()), Value::Array(transform)),
    ]);

    let mut buf = Vec::new();
    ciborium::ser::into_writer(&frame, &mut buf).context("Failed to encode frame")?;
    Ok(buf)
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let target = args.get(1).map(String::as_str).unwrap_or("127.0.0.1:54321");
    let subject = args.get(2).map(String::as_str).unwrap_or("android");
    let fps: u32 = match args.get(3) {
        Some(fps) => fps.parse().context("fps must be a positive integer")?,
        None => 60,
    };
    let frame_duration = Duration::from_secs_f32(1.0 / fps.max(1) as f32);

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    println!(
        "Sending '{}' face frames to {} at {} FPS...",
        subject, target, fps
    );

    let start = Instant::now();
    let mut sent: u64 = 0;

    loop {
        let frame_start = Instant::now();
        let payload = face_frame(subject, start.elapsed().as_secs_f32())?;

        match socket.send_to(&payload, target) {
            Ok(_) => {
                sent += 1;
                if sent % 1000 == 0 {
                    info!("Sent {} frames", sent);
                }
            }
            Err(e) => error!("Error sending frame: {}", e),
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }
}

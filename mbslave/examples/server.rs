use clap::Parser;
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec};

use mbslave::*;

#[derive(Parser)]
#[clap(name = "server", about = "An interactive Modbus slave")]
struct Args {
    /// address to listen on for Modbus TCP
    #[clap(long, default_value = "127.0.0.1:10502")]
    listen: String,
    /// serial port to serve Modbus RTU on, e.g. /dev/ttyUSB0
    #[clap(long)]
    port: Option<String>,
    /// baud rate of the serial port
    #[clap(long, default_value_t = 9600)]
    baud: u32,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();

    // device 1 exists by default; everything else is created interactively
    let server = spawn_server_task();

    let listener = tcp::spawn_tcp_server_task(args.listen.parse()?, server.clone()).await?;
    println!("listening on {}", listener.local_addr());

    #[cfg(feature = "serial")]
    let _port = match &args.port {
        Some(path) => {
            println!("serving RTU on {path}");
            Some(serial::spawn_rtu_server_task(
                serial::open(path, args.baud)?,
                server.clone(),
            ))
        }
        None => None,
    };

    // custom function code 0x41: echo the request payload back unchanged
    server
        .register_handler(0x41, Box::new(|_, frame| Ok(frame.payload().to_vec())))
        .await?;

    let mut reader = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    while let Some(line) = reader.next().await {
        let line = line?;
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("x"), _) => return Ok(()),
            (Some("add"), Some(id)) => match id.parse::<u8>() {
                Ok(id) => match server.create_device(UnitId::new(id)).await {
                    Ok(()) => println!("created device {id}"),
                    Err(err) => println!("{err}"),
                },
                Err(_) => println!("not a device id: {id}"),
            },
            (Some("rm"), Some(id)) => match id.parse::<u8>() {
                Ok(id) => match server.remove_device(UnitId::new(id)).await {
                    Ok(()) => println!("removed device {id}"),
                    Err(err) => println!("{err}"),
                },
                Err(_) => println!("not a device id: {id}"),
            },
            _ => println!("commands: add <id> | rm <id> | x"),
        }
    }

    Ok(())
}

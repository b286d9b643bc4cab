use clap::{Parser, Subcommand, ValueEnum};
use interprocess::local_socket::{tokio::Stream, traits::tokio::Stream as _};
use sharelocation_logic::{Location, SignInForm, SignUpForm};
use sharelocation_test_shared::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
struct Cli {
    /// Path to the UNIX domain socket the test daemon is listening on
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Permission {
    Grant,
    Revoke,
}

#[derive(Subcommand)]
enum DeviceCommand {
    /// Create an account and sign into it
    SignUp {
        name: String,
        email: String,
        password: String,
        /// Defaults to the password
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Sign into an existing account
    SignIn { email: String, password: String },
    /// Start a session if the device is still signed in
    Resume,
    /// Move the device
    MoveTo {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        long: f64,
    },
    /// Grant or revoke the location permission
    Permission {
        #[arg(value_enum)]
        permission: Permission,
    },
    /// Stop sharing and sign out
    Logout,
    /// List the markers on the device's map
    Markers,
}

impl From<DeviceCommand> for DeviceRequest {
    fn from(cmd: DeviceCommand) -> Self {
        match cmd {
            DeviceCommand::SignUp {
                name,
                email,
                confirm,
                password,
            } => DeviceRequest::CreateAccount(SignUpForm {
                name,
                email,
                confirm_password: confirm.unwrap_or_else(|| password.clone()),
                password,
            }),
            DeviceCommand::SignIn { email, password } => {
                DeviceRequest::SignIn(SignInForm { email, password })
            }
            DeviceCommand::Resume => DeviceRequest::Resume,
            DeviceCommand::MoveTo { lat, long } => DeviceRequest::MoveTo(Location::new(lat, long)),
            DeviceCommand::Permission { permission } => {
                DeviceRequest::SetPermission(permission == Permission::Grant)
            }
            DeviceCommand::Logout => DeviceRequest::Logout,
            DeviceCommand::Markers => DeviceRequest::ListMarkers,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a simulated device
    Add {
        /// Name used to address the device
        device: String,
    },
    /// Execute a command on a device
    Device {
        device: String,
        #[command(subcommand)]
        command: DeviceCommand,
    },
    /// Let the loops of every device run once
    Tick,
    /// Make store writes fail, or work again
    FailWrites {
        #[arg(action = clap::ArgAction::Set)]
        fail: bool,
    },
    /// Make store reads fail, or work again
    FailReads {
        #[arg(action = clap::ArgAction::Set)]
        fail: bool,
    },
    /// Print every record in the store
    Dump,
}

impl From<Commands> for TestingRequest {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Add { device } => TestingRequest::AddDevice(device),
            Commands::Device { device, command } => TestingRequest::Device(device, command.into()),
            Commands::Tick => TestingRequest::NextTick,
            Commands::FailWrites { fail } => TestingRequest::FailWrites(fail),
            Commands::FailReads { fail } => TestingRequest::FailReads(fail),
            Commands::Dump => TestingRequest::DumpStore,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let cli = Cli::parse();

    let socket_name = get_socket_name(cli.socket.clone()).context("Failed to get socket name")?;

    let stream = Stream::connect(socket_name)
        .await
        .context("Failed to connect to socket")?;

    let req = TestingRequest::from(cli.command);
    let mut encoded = serde_json::to_vec(&req).context("Failed to encode request")?;
    encoded.push(b'\n');
    (&stream)
        .write_all(&encoded)
        .await
        .context("Failed to send request")?;

    let mut recv = BufReader::new(&stream);
    let mut line = String::with_capacity(256);

    // Device events may come in before the answer, print those too
    loop {
        line.clear();
        let read = recv
            .read_line(&mut line)
            .await
            .context("Failed to read response")?;
        if read == 0 {
            bail!("Daemon closed the connection");
        }

        let resp: TestingResponse =
            serde_json::from_str(&line).context("Failed to parse response")?;
        println!("{}", line.trim_end());

        if resp.is_final() {
            if let TestingResponse::Error(why) = resp {
                bail!("Daemon error: {why}");
            }
            break;
        }
    }

    Ok(())
}

pub mod blkdiscard;
pub mod blkid;
pub mod dependencies;
pub mod hdparm;
pub mod kpartx;
pub mod lsblk;
pub mod mdadm;
pub mod mkfs;
pub mod mkswap;
pub mod mvcli;
pub mod nvme;
pub mod sgdisk;
pub mod zerofill;
